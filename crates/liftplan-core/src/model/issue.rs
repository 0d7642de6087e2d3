use std::fmt;

use serde::{Deserialize, Serialize};

use super::exercise::ExerciseId;

/// Whether an issue blocks acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Hard,
    Soft,
}

/// Validation issue codes, listed in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    DayCountMismatch,
    DayOverflow,
    EquipmentViolation,
    DuplicateInDay,
    EmphasisUnmet,
}

impl IssueCode {
    pub fn severity(self) -> Severity {
        match self {
            Self::EmphasisUnmet => Severity::Soft,
            _ => Severity::Hard,
        }
    }

    pub fn is_hard(self) -> bool {
        self.severity() == Severity::Hard
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DayCountMismatch => "DAY_COUNT_MISMATCH",
            Self::DayOverflow => "DAY_OVERFLOW",
            Self::EquipmentViolation => "EQUIPMENT_VIOLATION",
            Self::DuplicateInDay => "DUPLICATE_IN_DAY",
            Self::EmphasisUnmet => "EMPHASIS_UNMET",
        };
        f.write_str(s)
    }
}

/// A single finding from plan validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercise_id: Option<ExerciseId>,
}

impl ValidationIssue {
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            day_index: None,
            exercise_id: None,
        }
    }

    pub fn on_day(mut self, day_index: usize) -> Self {
        self.day_index = Some(day_index);
        self
    }

    pub fn for_exercise(mut self, id: &ExerciseId) -> Self {
        self.exercise_id = Some(id.clone());
        self
    }

    pub fn is_hard(&self) -> bool {
        self.code.is_hard()
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Whether any issue in the slice is hard.
pub fn has_hard(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(ValidationIssue::is_hard)
}
