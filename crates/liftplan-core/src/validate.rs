//! Plan validation.
//!
//! Checks run in a fixed order and every violation instance becomes its own
//! [`ValidationIssue`], so callers can act on issues one by one:
//!
//! 1. `DAY_COUNT_MISMATCH` (hard, at most one)
//! 2. `DAY_OVERFLOW` (hard, one per overflowing day)
//! 3. `EQUIPMENT_VIOLATION` (hard, one per block outside the allowed list)
//! 4. `DUPLICATE_IN_DAY` (hard, one per day and repeated id)
//! 5. `EMPHASIS_UNMET` (soft, one per uncovered muscle)

use crate::allowed::AllowedList;
use crate::model::plan::repeated_ids;
use crate::model::{IssueCode, Plan, UserProfile, ValidationIssue};
use crate::synth::local::week_trains;

/// Validate `plan` against `profile`. An empty result means the plan passes.
pub fn validate(
    plan: &Plan,
    profile: &UserProfile,
    allowed: &AllowedList<'_>,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let expected_days = profile.days_per_week();
    if plan.days.len() != expected_days {
        issues.push(ValidationIssue::new(
            IssueCode::DayCountMismatch,
            format!(
                "plan has {} days, profile asks for {expected_days}",
                plan.days.len()
            ),
        ));
    }

    let cap = profile.max_exercises_per_day();
    for day in &plan.days {
        if day.blocks.len() > cap {
            issues.push(
                ValidationIssue::new(
                    IssueCode::DayOverflow,
                    format!(
                        "day {} has {} exercises, limit is {cap}",
                        day.day_index,
                        day.blocks.len()
                    ),
                )
                .on_day(day.day_index),
            );
        }
    }

    for day in &plan.days {
        for id in day.exercise_ids().filter(|id| !allowed.contains(id)) {
            let reason = if allowed.catalog().contains(id) {
                "is not allowed for this profile"
            } else {
                "is not in the catalog"
            };
            issues.push(
                ValidationIssue::new(
                    IssueCode::EquipmentViolation,
                    format!("day {}: exercise {id} {reason}", day.day_index),
                )
                .on_day(day.day_index)
                .for_exercise(id),
            );
        }
    }

    for day in &plan.days {
        for id in repeated_ids(day) {
            issues.push(
                ValidationIssue::new(
                    IssueCode::DuplicateInDay,
                    format!("day {}: exercise {id} appears more than once", day.day_index),
                )
                .on_day(day.day_index)
                .for_exercise(id),
            );
        }
    }

    for muscle in profile.emphasis() {
        if !week_trains(&plan.days, allowed, muscle) {
            issues.push(ValidationIssue::new(
                IssueCode::EmphasisUnmet,
                format!("emphasized muscle {muscle} is not trained this week"),
            ));
        }
    }

    tracing::debug!(
        issues = issues.len(),
        hard = issues.iter().filter(|i| i.is_hard()).count(),
        "validated plan"
    );

    issues
}
