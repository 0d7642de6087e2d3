//! Pipeline stage graph.

use std::fmt;

use crate::model::ValidationIssue;

/// A stage of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Filter,
    Synthesize,
    Validate,
    Repair,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Filter => "filter",
            Self::Synthesize => "synthesize",
            Self::Validate => "validate",
            Self::Repair => "repair",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The pipeline state machine.
///
/// ```text
/// filter     -> synthesize
/// filter     -> failed      (empty allowed list)
/// synthesize -> validate
/// validate   -> repair      (issues remain, attempts remain)
/// validate   -> done
/// repair     -> validate
/// ```
pub struct StageMachine;

impl StageMachine {
    pub fn is_valid_transition(from: Stage, to: Stage) -> bool {
        matches!(
            (from, to),
            (Stage::Filter, Stage::Synthesize)
                | (Stage::Filter, Stage::Failed)
                | (Stage::Synthesize, Stage::Validate)
                | (Stage::Validate, Stage::Repair)
                | (Stage::Validate, Stage::Done)
                | (Stage::Repair, Stage::Validate)
        )
    }

    /// Next stage after validation.
    ///
    /// Any issue, hard or soft, earns a repair while attempts remain. Once
    /// `attempts` reaches `max_attempts` the run is done regardless.
    pub fn after_validate(issues: &[ValidationIssue], attempts: u32, max_attempts: u32) -> Stage {
        if issues.is_empty() || attempts >= max_attempts {
            Stage::Done
        } else {
            Stage::Repair
        }
    }

    pub fn is_terminal(stage: Stage) -> bool {
        matches!(stage, Stage::Done | Stage::Failed)
    }
}
