use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers and tags
// ---------------------------------------------------------------------------

/// Catalog identifier of an exercise (e.g. `exrx:BBBenchPress`).
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct ExerciseId(pub String);

impl ExerciseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExerciseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExerciseId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ExerciseId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A muscle tag such as `chest` or `hamstrings`.
///
/// Tags are normalized on construction: lowercase, with spaces and dashes
/// folded to underscores, so `"Front Delts"` and `front_delts` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Muscle(String);

impl Muscle {
    pub fn new(tag: &str) -> Self {
        let normalized = tag
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect();
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Muscle {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<&str> for Muscle {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Muscle> for String {
    fn from(m: Muscle) -> Self {
        m.0
    }
}

impl fmt::Display for Muscle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Equipment an exercise needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Equipment {
    Barbell,
    Dumbbell,
    Machines,
    Cables,
    Kettlebells,
    Bodyweight,
    Bands,
}

impl Equipment {
    pub const ALL: [Equipment; 7] = [
        Self::Barbell,
        Self::Dumbbell,
        Self::Machines,
        Self::Cables,
        Self::Kettlebells,
        Self::Bodyweight,
        Self::Bands,
    ];
}

impl fmt::Display for Equipment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Barbell => "barbell",
            Self::Dumbbell => "dumbbell",
            Self::Machines => "machines",
            Self::Cables => "cables",
            Self::Kettlebells => "kettlebells",
            Self::Bodyweight => "bodyweight",
            Self::Bands => "bands",
        };
        f.write_str(s)
    }
}

impl FromStr for Equipment {
    type Err = EquipmentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "barbell" => Ok(Self::Barbell),
            "dumbbell" | "dumbbells" => Ok(Self::Dumbbell),
            "machines" | "machine" => Ok(Self::Machines),
            "cables" | "cable" => Ok(Self::Cables),
            "kettlebells" | "kettlebell" => Ok(Self::Kettlebells),
            "bodyweight" => Ok(Self::Bodyweight),
            "bands" | "band" => Ok(Self::Bands),
            other => Err(EquipmentParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Equipment`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid equipment: {0:?} (expected one of barbell, dumbbell, machines, cables, kettlebells, bodyweight, bands)")]
pub struct EquipmentParseError(pub String);

// ---------------------------------------------------------------------------

/// Movement pattern an exercise trains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MovementFunction {
    Push,
    Pull,
    Legs,
    Core,
    FullBody,
    Other,
}

impl MovementFunction {
    /// Classify a free-form function label from an external catalog.
    ///
    /// Exact names map directly; descriptive labels such as
    /// `horizontal_push` or `hip_hinge` map by keyword. Anything
    /// unrecognized is [`MovementFunction::Other`].
    pub fn classify(label: &str) -> Self {
        let label = label.trim().to_ascii_lowercase().replace('-', "_");
        match label.as_str() {
            "push" => return Self::Push,
            "pull" => return Self::Pull,
            "legs" => return Self::Legs,
            "core" => return Self::Core,
            "full_body" | "fullbody" => return Self::FullBody,
            "other" => return Self::Other,
            _ => {}
        }
        const RULES: &[(&str, MovementFunction)] = &[
            ("full_body", MovementFunction::FullBody),
            ("squat", MovementFunction::Legs),
            ("hinge", MovementFunction::Legs),
            ("lunge", MovementFunction::Legs),
            ("leg", MovementFunction::Legs),
            ("push", MovementFunction::Push),
            ("press", MovementFunction::Push),
            ("pull", MovementFunction::Pull),
            ("row", MovementFunction::Pull),
            ("core", MovementFunction::Core),
            ("anti_", MovementFunction::Core),
        ];
        RULES
            .iter()
            .find(|(keyword, _)| label.contains(keyword))
            .map(|(_, function)| *function)
            .unwrap_or(Self::Other)
    }
}

impl fmt::Display for MovementFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Legs => "legs",
            Self::Core => "core",
            Self::FullBody => "full_body",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

impl From<String> for MovementFunction {
    fn from(s: String) -> Self {
        Self::classify(&s)
    }
}

impl From<MovementFunction> for String {
    fn from(f: MovementFunction) -> Self {
        f.to_string()
    }
}

// ---------------------------------------------------------------------------

/// Mechanical classification of an exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    Compound,
    Isolation,
    #[serde(alias = "unknown")]
    Other,
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Compound => "compound",
            Self::Isolation => "isolation",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Exercise
// ---------------------------------------------------------------------------

/// An immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: ExerciseId,
    pub name: String,
    pub primary_muscles: BTreeSet<Muscle>,
    pub function: MovementFunction,
    #[serde(default)]
    pub equipment: BTreeSet<Equipment>,
    #[serde(rename = "type")]
    pub kind: ExerciseType,
    /// Reference page for the movement.
    #[serde(default, alias = "exrx_url", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Exercise {
    /// Whether every piece of equipment this exercise needs is available.
    pub fn fits_equipment(&self, available: &BTreeSet<Equipment>) -> bool {
        self.equipment.is_subset(available)
    }

    pub fn trains(&self, muscle: &Muscle) -> bool {
        self.primary_muscles.contains(muscle)
    }

    pub fn is_compound(&self) -> bool {
        self.kind == ExerciseType::Compound
    }
}
