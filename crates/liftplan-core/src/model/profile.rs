use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::exercise::{Equipment, ExerciseId, Muscle};
use super::plan::{Reps, SetScheme};

/// Training goal; selects the default set scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    #[default]
    Hypertrophy,
    Strength,
    Hybrid,
}

impl Goal {
    /// `(sets, reps, rest_seconds)` used when the profile does not override them.
    fn default_scheme(self) -> (u8, u8, u32) {
        match self {
            Self::Hypertrophy => (3, 10, 90),
            Self::Strength => (5, 5, 180),
            Self::Hybrid => (4, 8, 120),
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Hypertrophy => "hypertrophy",
            Self::Strength => "strength",
            Self::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

impl FromStr for Goal {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hypertrophy" => Ok(Self::Hypertrophy),
            "strength" => Ok(Self::Strength),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(ProfileError::InvalidGoal(other.to_owned())),
        }
    }
}

/// Errors raised while constructing a [`UserProfile`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("days_per_week must be between 1 and 7, got {0}")]
    DaysOutOfRange(u8),

    #[error("max_exercises_per_day must be at least 1")]
    ZeroExercisesPerDay,

    #[error("session_minutes_cap must be at least 1 minute")]
    ZeroSessionCap,

    #[error("{field} must be at least 1")]
    ZeroVolume { field: &'static str },

    #[error("invalid goal {0:?} (expected hypertrophy, strength, or hybrid)")]
    InvalidGoal(String),
}

/// A user's training constraints. Immutable once built.
///
/// Construct with [`UserProfile::builder`] or deserialize from TOML/JSON;
/// both paths run the same validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProfileSpec", into = "ProfileSpec")]
pub struct UserProfile {
    days_per_week: u8,
    max_exercises_per_day: u8,
    equipment_available: BTreeSet<Equipment>,
    blacklisted_exercises: BTreeSet<ExerciseId>,
    blacklisted_muscles: BTreeSet<Muscle>,
    emphasis: BTreeSet<Muscle>,
    session_minutes_cap: Option<u32>,
    goal: Goal,
    set_scheme: SetScheme,
}

impl UserProfile {
    /// Start building a profile with the two required fields.
    pub fn builder(days_per_week: u8, max_exercises_per_day: u8) -> ProfileBuilder {
        ProfileBuilder {
            spec: ProfileSpec {
                days_per_week,
                max_exercises_per_day,
                ..ProfileSpec::default()
            },
        }
    }

    pub fn days_per_week(&self) -> usize {
        usize::from(self.days_per_week)
    }

    pub fn max_exercises_per_day(&self) -> usize {
        usize::from(self.max_exercises_per_day)
    }

    pub fn equipment_available(&self) -> &BTreeSet<Equipment> {
        &self.equipment_available
    }

    pub fn blacklisted_exercises(&self) -> &BTreeSet<ExerciseId> {
        &self.blacklisted_exercises
    }

    pub fn blacklisted_muscles(&self) -> &BTreeSet<Muscle> {
        &self.blacklisted_muscles
    }

    pub fn emphasis(&self) -> &BTreeSet<Muscle> {
        &self.emphasis
    }

    pub fn session_minutes_cap(&self) -> Option<u32> {
        self.session_minutes_cap
    }

    pub fn goal(&self) -> Goal {
        self.goal
    }

    /// Set scheme applied to every block the local synthesizer creates.
    pub fn set_scheme(&self) -> SetScheme {
        self.set_scheme.clone()
    }
}

/// Builder for [`UserProfile`].
#[derive(Debug, Clone)]
pub struct ProfileBuilder {
    spec: ProfileSpec,
}

impl ProfileBuilder {
    pub fn equipment(mut self, equipment: impl IntoIterator<Item = Equipment>) -> Self {
        self.spec.equipment_available = equipment.into_iter().collect();
        self
    }

    pub fn blacklist_exercise(mut self, id: impl Into<ExerciseId>) -> Self {
        self.spec.blacklisted_exercises.insert(id.into());
        self
    }

    pub fn blacklist_muscle(mut self, muscle: &str) -> Self {
        self.spec.blacklisted_muscles.insert(Muscle::new(muscle));
        self
    }

    pub fn emphasize(mut self, muscle: &str) -> Self {
        self.spec.emphasis.insert(Muscle::new(muscle));
        self
    }

    pub fn session_minutes_cap(mut self, minutes: u32) -> Self {
        self.spec.session_minutes_cap = Some(minutes);
        self
    }

    pub fn goal(mut self, goal: Goal) -> Self {
        self.spec.goal = goal;
        self
    }

    pub fn sets(mut self, sets: u8) -> Self {
        self.spec.default_sets = Some(sets);
        self
    }

    pub fn reps(mut self, reps: u8) -> Self {
        self.spec.default_reps = Some(reps);
        self
    }

    pub fn rest_seconds(mut self, rest: u32) -> Self {
        self.spec.rest_seconds = Some(rest);
        self
    }

    pub fn build(self) -> Result<UserProfile, ProfileError> {
        UserProfile::try_from(self.spec)
    }
}

// ---------------------------------------------------------------------------
// Wire form
// ---------------------------------------------------------------------------

/// Unvalidated profile as it appears in profile files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSpec {
    pub days_per_week: u8,
    pub max_exercises_per_day: u8,
    #[serde(default)]
    pub equipment_available: BTreeSet<Equipment>,
    #[serde(default)]
    pub blacklisted_exercises: BTreeSet<ExerciseId>,
    #[serde(default)]
    pub blacklisted_muscles: BTreeSet<Muscle>,
    #[serde(default)]
    pub emphasis: BTreeSet<Muscle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_minutes_cap: Option<u32>,
    #[serde(default)]
    pub goal: Goal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sets: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_reps: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_seconds: Option<u32>,
}

impl TryFrom<ProfileSpec> for UserProfile {
    type Error = ProfileError;

    fn try_from(spec: ProfileSpec) -> Result<Self, Self::Error> {
        if !(1..=7).contains(&spec.days_per_week) {
            return Err(ProfileError::DaysOutOfRange(spec.days_per_week));
        }
        if spec.max_exercises_per_day == 0 {
            return Err(ProfileError::ZeroExercisesPerDay);
        }
        if spec.session_minutes_cap == Some(0) {
            return Err(ProfileError::ZeroSessionCap);
        }

        let (sets, reps, rest) = spec.goal.default_scheme();
        let sets = spec.default_sets.unwrap_or(sets);
        let reps = spec.default_reps.unwrap_or(reps);
        if sets == 0 {
            return Err(ProfileError::ZeroVolume { field: "default_sets" });
        }
        if reps == 0 {
            return Err(ProfileError::ZeroVolume { field: "default_reps" });
        }

        Ok(Self {
            days_per_week: spec.days_per_week,
            max_exercises_per_day: spec.max_exercises_per_day,
            equipment_available: spec.equipment_available,
            blacklisted_exercises: spec.blacklisted_exercises,
            blacklisted_muscles: spec.blacklisted_muscles,
            emphasis: spec.emphasis,
            session_minutes_cap: spec.session_minutes_cap,
            goal: spec.goal,
            set_scheme: SetScheme {
                sets,
                reps: Reps::Fixed(reps),
                rest_seconds: spec.rest_seconds.unwrap_or(rest),
            },
        })
    }
}

impl From<UserProfile> for ProfileSpec {
    fn from(profile: UserProfile) -> Self {
        let reps = match profile.set_scheme.reps {
            Reps::Fixed(n) => n,
            Reps::Range { min, .. } => min,
        };
        Self {
            days_per_week: profile.days_per_week,
            max_exercises_per_day: profile.max_exercises_per_day,
            equipment_available: profile.equipment_available,
            blacklisted_exercises: profile.blacklisted_exercises,
            blacklisted_muscles: profile.blacklisted_muscles,
            emphasis: profile.emphasis,
            session_minutes_cap: profile.session_minutes_cap,
            goal: profile.goal,
            default_sets: Some(profile.set_scheme.sets),
            default_reps: Some(reps),
            rest_seconds: Some(profile.set_scheme.rest_seconds),
        }
    }
}
