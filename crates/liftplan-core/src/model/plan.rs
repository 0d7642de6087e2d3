use std::collections::{BTreeMap, HashSet};
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::exercise::{ExerciseId, Muscle};
use crate::catalog::Catalog;

/// Seconds of work per set, used for session time estimates.
const COMPOUND_WORK_SECONDS: u32 = 40;
const ACCESSORY_WORK_SECONDS: u32 = 30;

/// Repetitions per set: a fixed count or an inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Reps {
    Fixed(u8),
    Range { min: u8, max: u8 },
}

impl Reps {
    fn is_valid(self) -> bool {
        match self {
            Self::Fixed(n) => n >= 1,
            Self::Range { min, max } => min >= 1 && min <= max,
        }
    }
}

impl fmt::Display for Reps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{n}"),
            Self::Range { min, max } => write!(f, "{min}-{max}"),
        }
    }
}

/// Volume prescription for one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SetScheme {
    pub sets: u8,
    pub reps: Reps,
    pub rest_seconds: u32,
}

impl SetScheme {
    /// Estimated minutes to complete this block, rounded up. Saturates
    /// instead of overflowing for extreme rest periods.
    pub fn estimated_minutes(&self, compound: bool) -> u32 {
        let work = if compound {
            COMPOUND_WORK_SECONDS
        } else {
            ACCESSORY_WORK_SECONDS
        };
        u32::from(self.sets)
            .saturating_mul(work.saturating_add(self.rest_seconds))
            .div_ceil(60)
    }

    fn is_valid(&self) -> bool {
        self.sets >= 1 && self.reps.is_valid()
    }
}

/// One exercise slot within a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExerciseBlock {
    pub exercise_id: ExerciseId,
    pub set_scheme: SetScheme,
}

/// A single training day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DayPlan {
    /// 0-based position of the day in the week.
    pub day_index: usize,
    #[serde(default)]
    pub label: String,
    pub blocks: Vec<ExerciseBlock>,
}

impl DayPlan {
    pub fn contains(&self, id: &ExerciseId) -> bool {
        self.blocks.iter().any(|b| &b.exercise_id == id)
    }

    pub fn exercise_ids(&self) -> impl Iterator<Item = &ExerciseId> {
        self.blocks.iter().map(|b| &b.exercise_id)
    }

    /// Estimated session length. Blocks whose exercise `is_compound` cannot
    /// classify are timed as accessories.
    pub fn estimated_minutes(&self, is_compound: impl Fn(&ExerciseId) -> bool) -> u32 {
        self.blocks.iter().fold(0u32, |total, block| {
            total.saturating_add(
                block
                    .set_scheme
                    .estimated_minutes(is_compound(&block.exercise_id)),
            )
        })
    }
}

/// Which backend produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Local,
    Llm,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Local => "local",
            Self::Llm => "llm",
        };
        f.write_str(s)
    }
}

/// Provenance of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMeta {
    pub seed: u64,
    pub mode: Mode,
    /// Number of repair attempts applied to reach this plan.
    pub attempt_count: u32,
}

/// A complete multi-day schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub days: Vec<DayPlan>,
    pub meta: PlanMeta,
}

impl Plan {
    /// Count of blocks per primary muscle across the week.
    ///
    /// Blocks whose exercise is unknown to `catalog` are skipped.
    pub fn weekly_focus(&self, catalog: &Catalog) -> BTreeMap<Muscle, usize> {
        let mut focus = BTreeMap::new();
        for exercise in self
            .days
            .iter()
            .flat_map(|d| d.exercise_ids())
            .filter_map(|id| catalog.get(id))
        {
            for muscle in &exercise.primary_muscles {
                *focus.entry(muscle.clone()).or_insert(0) += 1;
            }
        }
        focus
    }

    pub fn total_blocks(&self) -> usize {
        self.days.iter().map(|d| d.blocks.len()).sum()
    }

    /// Rewrite day indices to match positions. Returns whether anything
    /// changed.
    pub fn renumber_days(&mut self) -> bool {
        renumber(&mut self.days)
    }
}

fn renumber(days: &mut [DayPlan]) -> bool {
    let mut changed = false;
    for (position, day) in days.iter_mut().enumerate() {
        if day.day_index != position {
            day.day_index = position;
            changed = true;
        }
    }
    changed
}

// ---------------------------------------------------------------------------
// Structured-output draft
// ---------------------------------------------------------------------------

/// The shape a structured-output model is asked to return.
///
/// Mirrors [`Plan`] minus the metadata, which the pipeline fills in.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlanDraft {
    pub days: Vec<DayPlan>,
}

/// Reasons a draft cannot become a [`Plan`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("draft contains no days")]
    NoDays,

    #[error("day {day_index} has an invalid set scheme for {exercise_id}")]
    InvalidSetScheme {
        day_index: usize,
        exercise_id: ExerciseId,
    },

    #[error("draft has {found} days, expected {expected}")]
    DayCount { expected: usize, found: usize },
}

impl PlanDraft {
    /// Normalize a draft into a plan.
    ///
    /// Day indices are rewritten to match positions. Duplicate exercises are
    /// kept as-is; catching them is the validator's job.
    pub fn into_plan(self, meta: PlanMeta) -> Result<Plan, DraftError> {
        if self.days.is_empty() {
            return Err(DraftError::NoDays);
        }
        let mut days = self.days;
        renumber(&mut days);
        for day in &days {
            if let Some(block) = day.blocks.iter().find(|b| !b.set_scheme.is_valid()) {
                return Err(DraftError::InvalidSetScheme {
                    day_index: day.day_index,
                    exercise_id: block.exercise_id.clone(),
                });
            }
        }
        Ok(Plan { days, meta })
    }

    /// Like [`Self::into_plan`], additionally requiring an exact day count.
    pub fn into_plan_with_days(self, meta: PlanMeta, expected: usize) -> Result<Plan, DraftError> {
        if self.days.len() != expected {
            return Err(DraftError::DayCount {
                expected,
                found: self.days.len(),
            });
        }
        self.into_plan(meta)
    }

    /// JSON Schema for this draft, as sent to the model.
    pub fn json_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(PlanDraft);
        serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
    }
}

/// Exercise ids that appear more than once on a day, in first-seen order.
pub(crate) fn repeated_ids(day: &DayPlan) -> Vec<&ExerciseId> {
    let mut seen = HashSet::new();
    let mut repeated = Vec::new();
    for id in day.exercise_ids() {
        if !seen.insert(id) && !repeated.contains(&id) {
            repeated.push(id);
        }
    }
    repeated
}
