//! Core data model: exercises, profiles, plans, and validation issues.

pub mod exercise;
pub mod issue;
pub mod plan;
pub mod profile;

pub use exercise::{
    Equipment, EquipmentParseError, Exercise, ExerciseId, ExerciseType, MovementFunction, Muscle,
};
pub use issue::{IssueCode, Severity, ValidationIssue, has_hard};
pub use plan::{
    DayPlan, DraftError, ExerciseBlock, Mode, Plan, PlanDraft, PlanMeta, Reps, SetScheme,
};
pub use profile::{Goal, ProfileBuilder, ProfileError, ProfileSpec, UserProfile};
