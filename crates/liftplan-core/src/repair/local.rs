//! Deterministic, targeted plan repair.
//!
//! Each issue is resolved with the smallest mutation that fixes it. Issues
//! are applied in the order given; a later issue whose target has already
//! disappeared (e.g. a block truncated by an overflow fix) is skipped.

use async_trait::async_trait;
use thiserror::Error;

use super::Repairer;
use crate::allowed::AllowedList;
use crate::llm::StageResult;
use crate::model::{
    DayPlan, Exercise, ExerciseId, IssueCode, Mode, Plan, UserProfile, ValidationIssue,
};
use crate::synth::local::{generate_local, place_emphasis};

/// Errors from [`replace_exercise`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplaceError {
    #[error("plan has no day {0}")]
    UnknownDay(usize),

    #[error("day {day_index} does not contain {exercise_id}")]
    ExerciseNotInDay {
        day_index: usize,
        exercise_id: ExerciseId,
    },
}

/// Apply local fixes for `issues` to a copy of `plan`.
pub fn repair_local(
    plan: &Plan,
    issues: &[ValidationIssue],
    allowed: &AllowedList<'_>,
    profile: &UserProfile,
) -> Plan {
    let mut repaired = plan.clone();
    let mut emphasis_done = false;

    for issue in issues {
        match issue.code {
            IssueCode::DayCountMismatch => fix_day_count(&mut repaired, allowed, profile),
            IssueCode::DayOverflow => {
                if let Some(day) = issue_day(&mut repaired, issue) {
                    day.blocks.truncate(profile.max_exercises_per_day());
                }
            }
            IssueCode::EquipmentViolation => {
                if let (Some(day), Some(id)) =
                    (issue_day(&mut repaired, issue), issue.exercise_id.as_ref())
                {
                    fix_disallowed(day, id, allowed);
                }
            }
            IssueCode::DuplicateInDay => {
                if let (Some(day), Some(id)) =
                    (issue_day(&mut repaired, issue), issue.exercise_id.as_ref())
                {
                    fix_duplicate(day, id, allowed);
                }
            }
            IssueCode::EmphasisUnmet => {
                // One pass covers every uncovered muscle.
                if !emphasis_done {
                    fix_emphasis(&mut repaired, allowed, profile);
                    emphasis_done = true;
                }
            }
        }
    }

    tracing::debug!(
        issues = issues.len(),
        blocks_before = plan.total_blocks(),
        blocks_after = repaired.total_blocks(),
        "applied local repair"
    );
    repaired
}

fn day_mut(plan: &mut Plan, day_index: usize) -> Option<&mut DayPlan> {
    plan.days.iter_mut().find(|d| d.day_index == day_index)
}

fn issue_day<'p>(plan: &'p mut Plan, issue: &ValidationIssue) -> Option<&'p mut DayPlan> {
    day_mut(plan, issue.day_index?)
}

fn fix_day_count(plan: &mut Plan, allowed: &AllowedList<'_>, profile: &UserProfile) {
    let expected = profile.days_per_week();
    if plan.days.len() > expected {
        plan.days.truncate(expected);
        return;
    }
    if plan.days.len() < expected {
        let filler = generate_local(allowed, profile, plan.meta.seed);
        let start = plan.days.len();
        plan.days.extend(filler.days.into_iter().skip(start));
        for (position, day) in plan.days.iter_mut().enumerate().skip(start) {
            day.day_index = position;
        }
    }
}

/// Similarity of `candidate` to `original`: same function first, then
/// shared primary muscles, then same type.
fn closeness(original: Option<&Exercise>, candidate: &Exercise) -> (bool, usize, bool) {
    match original {
        Some(o) => (
            o.function == candidate.function,
            o.primary_muscles
                .intersection(&candidate.primary_muscles)
                .count(),
            o.kind == candidate.kind,
        ),
        None => (false, 0, false),
    }
}

/// Swap the first block using `id` for the closest allowed exercise not
/// already on the day, or drop it.
fn fix_disallowed(day: &mut DayPlan, id: &ExerciseId, allowed: &AllowedList<'_>) {
    let Some(position) = day.blocks.iter().position(|b| &b.exercise_id == id) else {
        return;
    };
    let original = allowed.catalog().get(id);

    let mut best: Option<(&Exercise, (bool, usize, bool))> = None;
    for candidate in allowed.iter().filter(|e| !day.contains(&e.id)) {
        let score = closeness(original, candidate);
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }

    match best {
        Some((replacement, _)) => {
            tracing::debug!(day = day.day_index, from = %id, to = %replacement.id, "swapped disallowed exercise");
            day.blocks[position].exercise_id = replacement.id.clone();
        }
        None => {
            tracing::debug!(day = day.day_index, exercise = %id, "removed disallowed exercise");
            day.blocks.remove(position);
        }
    }
}

/// Allowed exercises in order, starting just after `id` and wrapping.
fn wrapped_from<'a>(allowed: &AllowedList<'a>, id: &ExerciseId) -> Vec<&'a Exercise> {
    let start = allowed.position(id).map_or(0, |p| p + 1);
    let exercises = allowed.exercises();
    exercises[start..]
        .iter()
        .chain(&exercises[..start])
        .copied()
        .collect()
}

/// Replace every repeat of `id` after its first occurrence.
fn fix_duplicate(day: &mut DayPlan, id: &ExerciseId, allowed: &AllowedList<'_>) {
    let function = allowed.catalog().get(id).map(|e| e.function);
    let order = wrapped_from(allowed, id);

    let mut seen_first = false;
    let mut position = 0;
    while position < day.blocks.len() {
        if &day.blocks[position].exercise_id != id {
            position += 1;
            continue;
        }
        if !seen_first {
            seen_first = true;
            position += 1;
            continue;
        }

        let unused = |e: &&Exercise| !day.contains(&e.id);
        let replacement = order
            .iter()
            .copied()
            .filter(unused)
            .find(|e| Some(e.function) == function)
            .or_else(|| order.iter().copied().find(unused));

        match replacement {
            Some(exercise) => {
                day.blocks[position].exercise_id = exercise.id.clone();
                position += 1;
            }
            None => {
                day.blocks.remove(position);
            }
        }
    }
}

fn fix_emphasis(plan: &mut Plan, allowed: &AllowedList<'_>, profile: &UserProfile) {
    place_emphasis(&mut plan.days, allowed, profile, &profile.set_scheme());
}

/// Replace one exercise on one day with a similar allowed exercise.
///
/// The replacement is the first allowed exercise not already on that day
/// that shares the movement function or a primary muscle with the original.
/// When no such exercise exists the plan is returned unchanged.
pub fn replace_exercise(
    plan: &Plan,
    day_index: usize,
    exercise_id: &ExerciseId,
    allowed: &AllowedList<'_>,
) -> Result<Plan, ReplaceError> {
    let mut updated = plan.clone();
    let day = day_mut(&mut updated, day_index).ok_or(ReplaceError::UnknownDay(day_index))?;
    let position = day
        .blocks
        .iter()
        .position(|b| &b.exercise_id == exercise_id)
        .ok_or_else(|| ReplaceError::ExerciseNotInDay {
            day_index,
            exercise_id: exercise_id.clone(),
        })?;

    let original = allowed.catalog().get(exercise_id);
    let candidate = allowed.iter().find(|e| {
        !day.contains(&e.id)
            && original.is_some_and(|o| {
                o.function == e.function || !o.primary_muscles.is_disjoint(&e.primary_muscles)
            })
    });

    match candidate {
        Some(replacement) => {
            tracing::info!(day = day_index, from = %exercise_id, to = %replacement.id, "replaced exercise");
            day.blocks[position].exercise_id = replacement.id.clone();
        }
        None => {
            tracing::info!(day = day_index, exercise = %exercise_id, "no similar exercise available");
        }
    }
    Ok(updated)
}

/// [`Repairer`] backed by [`repair_local`]. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRepairer;

#[async_trait]
impl Repairer for LocalRepairer {
    fn mode(&self) -> Mode {
        Mode::Local
    }

    async fn repair(
        &self,
        plan: &Plan,
        issues: &[ValidationIssue],
        allowed: &AllowedList<'_>,
        profile: &UserProfile,
    ) -> StageResult<Plan> {
        StageResult::Ok(repair_local(plan, issues, allowed, profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allowed::filter;
    use crate::catalog::Catalog;
    use crate::model::{Equipment, ExerciseBlock, PlanMeta, Reps, SetScheme, has_hard};
    use crate::validate::validate;

    fn block(id: &str) -> ExerciseBlock {
        ExerciseBlock {
            exercise_id: id.into(),
            set_scheme: SetScheme {
                sets: 3,
                reps: Reps::Fixed(10),
                rest_seconds: 60,
            },
        }
    }

    fn plan(days: &[&[&str]]) -> Plan {
        Plan {
            days: days
                .iter()
                .enumerate()
                .map(|(i, ids)| DayPlan {
                    day_index: i,
                    label: format!("Day {}", i + 1),
                    blocks: ids.iter().map(|id| block(id)).collect(),
                })
                .collect(),
            meta: PlanMeta {
                seed: 21,
                mode: Mode::Local,
                attempt_count: 0,
            },
        }
    }

    fn bodyweight(days: u8, max: u8) -> UserProfile {
        UserProfile::builder(days, max)
            .equipment([Equipment::Bodyweight])
            .build()
            .unwrap()
    }

    fn ids(day: &DayPlan) -> Vec<&str> {
        day.exercise_ids().map(ExerciseId::as_str).collect()
    }

    fn run(p: &Plan, profile: &UserProfile, catalog: &Catalog) -> Plan {
        let allowed = filter(catalog, profile).unwrap();
        let issues = validate(p, profile, &allowed);
        repair_local(p, &issues, &allowed, profile)
    }

    #[test]
    fn drops_extra_days() {
        let catalog = Catalog::builtin();
        let profile = bodyweight(2, 3);
        let fixed = run(
            &plan(&[&["bw_push_up"], &["bw_pull_up"], &["bw_plank"]]),
            &profile,
            &catalog,
        );
        assert_eq!(fixed.days.len(), 2);
        assert_eq!(ids(&fixed.days[1]), vec!["bw_pull_up"]);
    }

    #[test]
    fn appends_missing_days() {
        let catalog = Catalog::builtin();
        let profile = bodyweight(3, 3);
        let original = plan(&[&["bw_push_up"]]);
        let fixed = run(&original, &profile, &catalog);
        assert_eq!(fixed.days.len(), 3);
        assert_eq!(fixed.days[0], original.days[0]);
        assert_eq!(fixed.days[2].day_index, 2);
        assert!(!fixed.days[2].blocks.is_empty());
    }

    #[test]
    fn truncates_overflowing_day() {
        let catalog = Catalog::builtin();
        let profile = bodyweight(1, 2);
        let fixed = run(
            &plan(&[&["bw_push_up", "bw_dip", "bw_plank"]]),
            &profile,
            &catalog,
        );
        assert_eq!(ids(&fixed.days[0]), vec!["bw_push_up", "bw_dip"]);
    }

    #[test]
    fn swaps_disallowed_for_closest_match() {
        let catalog = Catalog::builtin();
        let profile = bodyweight(1, 3);
        let fixed = run(
            &plan(&[&["bb_bench_press", "bw_plank"]]),
            &profile,
            &catalog,
        );
        // Push-ups share the function, chest and triceps, and type.
        assert_eq!(ids(&fixed.days[0]), vec!["bw_push_up", "bw_plank"]);
        assert_eq!(fixed.days[0].blocks[0].set_scheme.rest_seconds, 60);
    }

    #[test]
    fn swap_skips_exercises_already_on_the_day() {
        let catalog = Catalog::builtin();
        let profile = bodyweight(1, 3);
        let fixed = run(
            &plan(&[&["bw_push_up", "bb_bench_press"]]),
            &profile,
            &catalog,
        );
        assert_eq!(ids(&fixed.days[0]), vec!["bw_push_up", "bw_pike_push_up"]);
    }

    #[test]
    fn duplicate_is_replaced_with_same_function() {
        let catalog = Catalog::builtin();
        let profile = bodyweight(2, 3);
        let original = plan(&[&["bw_push_up", "bw_push_up"], &["bw_pull_up"]]);
        let fixed = run(&original, &profile, &catalog);
        // Next push movement after push-ups in allowed order.
        assert_eq!(ids(&fixed.days[0]), vec!["bw_push_up", "bw_pike_push_up"]);
        assert_eq!(fixed.days[1], original.days[1]);
    }

    #[test]
    fn duplicate_falls_back_to_any_function() {
        let catalog = Catalog::builtin();
        let profile = bodyweight(1, 5);
        // Every bodyweight push movement is already on the day.
        let fixed = run(
            &plan(&[&["bw_dip", "bw_push_up", "bw_pike_push_up", "bw_dip"]]),
            &profile,
            &catalog,
        );
        let day = ids(&fixed.days[0]);
        assert_eq!(&day[..3], &["bw_dip", "bw_push_up", "bw_pike_push_up"]);
        assert_eq!(day[3], "bw_pull_up");
    }

    #[test]
    fn emphasis_added_where_room_exists() {
        let catalog = Catalog::builtin();
        let profile = UserProfile::builder(2, 2)
            .equipment([Equipment::Bodyweight])
            .emphasize("hip_flexors")
            .build()
            .unwrap();
        let fixed = run(
            &plan(&[&["bw_push_up", "bw_dip"], &["bw_pull_up"]]),
            &profile,
            &catalog,
        );
        assert_eq!(ids(&fixed.days[0]), vec!["bw_push_up", "bw_dip"]);
        assert_eq!(ids(&fixed.days[1]), vec!["bw_pull_up", "bw_hanging_leg_raise"]);
    }

    #[test]
    fn emphasis_repair_keeps_session_cap() {
        let catalog = Catalog::builtin();
        let profile = UserProfile::builder(2, 3)
            .equipment([Equipment::Bodyweight])
            .session_minutes_cap(10)
            .emphasize("hip_flexors")
            .build()
            .unwrap();
        // One 5-minute block per day; a second block would pass 10 minutes.
        let fixed = run(&plan(&[&["bw_push_up"], &["bw_pull_up"]]), &profile, &catalog);
        assert_eq!(ids(&fixed.days[0]), vec!["bw_hanging_leg_raise"]);
        assert_eq!(ids(&fixed.days[1]), vec!["bw_pull_up"]);
    }

    #[test]
    fn hard_issues_cleared_in_one_pass() {
        let catalog = Catalog::builtin();
        let profile = bodyweight(3, 2);
        let messy = plan(&[
            &["bb_deadlift", "bb_deadlift", "bw_dip"],
            &["bw_pull_up", "bw_pull_up"],
        ]);
        let allowed = filter(&catalog, &profile).unwrap();
        let issues = validate(&messy, &profile, &allowed);
        assert!(has_hard(&issues));
        let fixed = repair_local(&messy, &issues, &allowed, &profile);
        assert!(validate(&fixed, &profile, &allowed).is_empty());
    }

    #[test]
    fn replace_exercise_picks_similar_movement() {
        let catalog = Catalog::builtin();
        let profile = bodyweight(1, 3);
        let allowed = filter(&catalog, &profile).unwrap();
        let original = plan(&[&["bw_pull_up", "bw_plank"]]);
        let updated =
            replace_exercise(&original, 0, &ExerciseId::new("bw_pull_up"), &allowed).unwrap();
        assert_eq!(ids(&updated.days[0]), vec!["bw_inverted_row", "bw_plank"]);
    }

    #[test]
    fn replace_exercise_errors_and_no_candidate() {
        let catalog = Catalog::builtin();
        let profile = UserProfile::builder(1, 3)
            .equipment([Equipment::Bands])
            .build()
            .unwrap();
        let allowed = filter(&catalog, &profile).unwrap();
        let original = plan(&[&["bd_pull_apart"]]);

        assert_eq!(
            replace_exercise(&original, 4, &ExerciseId::new("bd_pull_apart"), &allowed),
            Err(ReplaceError::UnknownDay(4))
        );
        assert!(matches!(
            replace_exercise(&original, 0, &ExerciseId::new("bw_plank"), &allowed),
            Err(ReplaceError::ExerciseNotInDay { day_index: 0, .. })
        ));
        // The only other band movement shares neither function nor muscles.
        let unchanged =
            replace_exercise(&original, 0, &ExerciseId::new("bd_pull_apart"), &allowed).unwrap();
        assert_eq!(unchanged, original);
    }
}
