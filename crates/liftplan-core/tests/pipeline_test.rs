//! Integration tests for the local pipeline: filter, synthesize, validate,
//! repair, and the orchestrator loop that ties them together.

use std::sync::Arc;

use liftplan_core::catalog::Catalog;
use liftplan_core::model::{Equipment, ExerciseId, IssueCode, Mode, UserProfile, has_hard};
use liftplan_core::pipeline::{Pipeline, PipelineConfig, PipelineError, Termination};
use liftplan_core::repair::{replace_exercise, repair_local};
use liftplan_core::synth::generate_local;
use liftplan_core::{filter, validate};
use liftplan_test_utils::{bodyweight_profile, full_gym_profile, mixed_catalog, plan_of};

fn builtin_pipeline() -> Pipeline {
    Pipeline::new(Arc::new(Catalog::builtin()), PipelineConfig::default())
}

// ---------------------------------------------------------------------------
// Stage scenarios
// ---------------------------------------------------------------------------

#[test]
fn bodyweight_three_day_plan_validates_clean() {
    let catalog = mixed_catalog();
    let profile = bodyweight_profile(3, 4);
    let allowed = filter(&catalog, &profile).unwrap();

    let plan = generate_local(&allowed, &profile, 7);
    assert_eq!(plan.days.len(), 3);
    for day in &plan.days {
        assert!(!day.blocks.is_empty());
        assert!(day.blocks.len() <= 4);
    }
    assert!(validate(&plan, &profile, &allowed).is_empty());
}

#[test]
fn profile_without_matching_equipment_is_rejected() {
    let catalog = mixed_catalog();
    let profile = UserProfile::builder(3, 4)
        .equipment([Equipment::Machines])
        .build()
        .unwrap();

    let err = filter(&catalog, &profile).unwrap_err();
    assert!(err.to_string().contains("10"), "{err}");

    let pipeline = Pipeline::new(Arc::new(catalog), PipelineConfig::default());
    let err = pipeline.run_local(&profile, 1).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyAllowedList(_)));
}

#[test]
fn duplicate_is_reported_once_and_repaired_in_place() {
    let catalog = mixed_catalog();
    let profile = bodyweight_profile(3, 4);
    let allowed = filter(&catalog, &profile).unwrap();
    let plan = plan_of(&[
        &["push_up", "pull_up", "push_up", "air_squat"],
        &["pike_push_up", "inverted_row", "plank"],
        &["air_squat", "glute_bridge", "pull_up"],
    ]);

    let issues = validate(&plan, &profile, &allowed);
    assert_eq!(issues.len(), 1, "{issues:?}");
    assert_eq!(issues[0].code, IssueCode::DuplicateInDay);
    assert_eq!(issues[0].day_index, Some(0));
    assert_eq!(issues[0].exercise_id, Some(ExerciseId::new("push_up")));

    let repaired = repair_local(&plan, &issues, &allowed, &profile);
    assert_eq!(repaired.days[1], plan.days[1]);
    assert_eq!(repaired.days[2], plan.days[2]);
    assert_eq!(repaired.days[0].blocks.len(), 4);
    assert!(validate(&repaired, &profile, &allowed).is_empty());
}

#[test]
fn disallowed_exercise_is_swapped_for_a_similar_one() {
    let catalog = mixed_catalog();
    let profile = bodyweight_profile(2, 3);
    let allowed = filter(&catalog, &profile).unwrap();
    let plan = plan_of(&[&["db_press", "pull_up"], &["air_squat", "plank"]]);

    let issues = validate(&plan, &profile, &allowed);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].code, IssueCode::EquipmentViolation);

    let repaired = repair_local(&plan, &issues, &allowed, &profile);
    assert_eq!(repaired.days[0].blocks[0].exercise_id, ExerciseId::new("push_up"));
    assert_eq!(repaired.days[1], plan.days[1]);
}

#[test]
fn swap_replaces_only_the_named_block() {
    let catalog = mixed_catalog();
    let profile = bodyweight_profile(2, 3);
    let allowed = filter(&catalog, &profile).unwrap();
    let plan = plan_of(&[&["pull_up", "air_squat"], &["pull_up", "plank"]]);

    let swapped = replace_exercise(&plan, 0, &ExerciseId::new("pull_up"), &allowed).unwrap();
    assert_eq!(
        swapped.days[0].blocks[0].exercise_id,
        ExerciseId::new("inverted_row")
    );
    assert_eq!(swapped.days[0].blocks[1], plan.days[0].blocks[1]);
    assert_eq!(swapped.days[1], plan.days[1]);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn local_generation_is_deterministic_per_seed() {
    let catalog = Catalog::builtin();
    for days in 1..=7 {
        let profile = full_gym_profile(days, 5);
        let allowed = filter(&catalog, &profile).unwrap();
        for seed in [0, 1, 42, u64::MAX] {
            let a = generate_local(&allowed, &profile, seed);
            let b = generate_local(&allowed, &profile, seed);
            assert_eq!(a, b, "days={days} seed={seed}");
            assert!(validate(&a, &profile, &allowed).is_empty());
        }
    }
}

#[test]
fn local_repair_clears_hard_issues_within_budget() {
    let catalog = Catalog::builtin();
    let profile = bodyweight_profile(3, 3);
    let allowed = filter(&catalog, &profile).unwrap();

    for seed in 0..20 {
        let mut plan = generate_local(&allowed, &profile, seed);
        // Break it every way at once.
        let first = plan.days[0].blocks[0].clone();
        plan.days[0].blocks.push(first);
        plan.days[1].blocks[0].exercise_id = ExerciseId::new("bb_back_squat");
        plan.days.truncate(2);

        let mut issues = validate(&plan, &profile, &allowed);
        assert!(has_hard(&issues));
        for _ in 0..PipelineConfig::default().max_repair_attempts {
            if issues.is_empty() {
                break;
            }
            plan = repair_local(&plan, &issues, &allowed, &profile);
            issues = validate(&plan, &profile, &allowed);
        }
        assert!(!has_hard(&issues), "seed={seed}: {issues:?}");
        assert_eq!(plan.days.len(), 3);
    }
}

#[test]
fn runs_never_exceed_the_repair_budget() {
    let profile = UserProfile::builder(4, 4)
        .equipment([Equipment::Bodyweight, Equipment::Bands])
        .emphasize("calves")
        .emphasize("rear_delts")
        .build()
        .unwrap();

    for budget in 0..4 {
        let pipeline = Pipeline::new(
            Arc::new(Catalog::builtin()),
            PipelineConfig {
                max_repair_attempts: budget,
                ..PipelineConfig::default()
            },
        );
        let outcome = pipeline.run_local(&profile, 3).unwrap();
        assert!(outcome.attempts_used <= budget);
        assert_eq!(outcome.plan.meta.attempt_count, outcome.attempts_used);
        assert_eq!(outcome.termination, Termination::BudgetExhausted);
        assert!(outcome.issues.iter().all(|i| i.code == IssueCode::EmphasisUnmet));
    }
}

#[test]
fn emphasis_never_breaks_the_session_cap() {
    let catalog = Arc::new(Catalog::builtin());
    let profile = UserProfile::builder(3, 5)
        .equipment([Equipment::Bodyweight])
        .session_minutes_cap(10)
        .emphasize("hip_flexors")
        .build()
        .unwrap();
    let pipeline = Pipeline::new(catalog.clone(), PipelineConfig::default());

    for seed in 0..10 {
        let outcome = pipeline.run_local(&profile, seed).unwrap();
        assert_eq!(outcome.termination, Termination::Passed, "seed {seed}");
        for day in &outcome.plan.days {
            let minutes =
                day.estimated_minutes(|id| catalog.get(id).is_some_and(|e| e.is_compound()));
            assert!(minutes <= 10, "seed {seed} day {}: {minutes} min", day.day_index);
        }
    }
}

#[test]
fn huge_rest_periods_still_produce_a_plan() {
    let profile = UserProfile::builder(3, 4)
        .equipment([Equipment::Bodyweight])
        .rest_seconds(u32::MAX)
        .build()
        .unwrap();
    let outcome = builtin_pipeline().run_local(&profile, 5).unwrap();
    assert_eq!(outcome.termination, Termination::Passed);
    assert_eq!(outcome.plan.days.len(), 3);
}

#[test]
fn run_outcome_matches_direct_generation() {
    let catalog = Catalog::builtin();
    let profile = bodyweight_profile(3, 4);
    let allowed = filter(&catalog, &profile).unwrap();

    let outcome = builtin_pipeline().run_local(&profile, 11).unwrap();
    assert_eq!(outcome.plan, generate_local(&allowed, &profile, 11));
    assert_eq!(outcome.plan.meta.mode, Mode::Local);
    assert_eq!(outcome.plan.meta.seed, 11);
    assert_eq!(outcome.termination, Termination::Passed);
}

#[tokio::test]
async fn concurrent_runs_share_one_catalog() {
    let pipeline = builtin_pipeline();
    let mut handles = Vec::new();
    for seed in 0..8u64 {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            let profile = full_gym_profile(4, 5);
            let outcome = pipeline
                .run(&profile, seed, tokio_util::sync::CancellationToken::new())
                .await
                .unwrap();
            (seed, outcome)
        }));
    }

    for handle in handles {
        let (seed, outcome) = handle.await.unwrap();
        let again = pipeline.run_local(&full_gym_profile(4, 5), seed).unwrap();
        assert_eq!(outcome.plan, again.plan);
        assert!(outcome.accepted);
    }
}
