//! Plain-text tables for terminal output.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use liftplan_core::assist::PlanExplanation;
use liftplan_core::catalog::Catalog;
use liftplan_core::model::{Exercise, Plan, ValidationIssue};
use liftplan_core::pipeline::PipelineOutcome;

fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() > width {
        let head: String = name.chars().take(width - 3).collect();
        format!("{head}...")
    } else {
        name.to_string()
    }
}

/// The plan as one table per day.
pub fn plan_table(plan: &Plan, catalog: &Catalog, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Plan: {} days (mode {}, seed {}, {} repair attempts)",
        plan.days.len(),
        plan.meta.mode,
        plan.meta.seed,
        plan.meta.attempt_count
    );
    let _ = writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M UTC"));

    for day in &plan.days {
        let _ = writeln!(out);
        let _ = writeln!(out, "Day {}: {}", day.day_index + 1, day.label);
        if day.blocks.is_empty() {
            let _ = writeln!(out, "  (rest)");
            continue;
        }
        let _ = writeln!(
            out,
            "  {:<30} {:<10} {:>5} {:>6} {:>6}",
            "EXERCISE", "FUNCTION", "SETS", "REPS", "REST"
        );
        let _ = writeln!(out, "  {}", "-".repeat(61));
        for block in &day.blocks {
            let exercise = catalog.get(&block.exercise_id);
            let name = exercise.map_or(block.exercise_id.as_str(), |e| e.name.as_str());
            let function = exercise.map_or("-".to_string(), |e| e.function.to_string());
            let scheme = &block.set_scheme;
            let _ = writeln!(
                out,
                "  {:<30} {:<10} {:>5} {:>6} {:>5}s",
                truncate(name, 28),
                function,
                scheme.sets,
                scheme.reps.to_string(),
                scheme.rest_seconds
            );
        }
    }

    let focus = plan.weekly_focus(catalog);
    if !focus.is_empty() {
        let _ = writeln!(out);
        let summary: Vec<String> = focus.iter().map(|(m, n)| format!("{m} {n}")).collect();
        let _ = writeln!(out, "Weekly focus: {}", summary.join(", "));
    }
    out
}

/// Validation issues, one per row.
pub fn issues_table(issues: &[ValidationIssue]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<20} {:<5} {:>4} {:<24} MESSAGE",
        "CODE", "KIND", "DAY", "EXERCISE"
    );
    let _ = writeln!(out, "{}", "-".repeat(76));
    for issue in issues {
        let day = issue
            .day_index
            .map_or("-".to_string(), |d| (d + 1).to_string());
        let exercise = issue.exercise_id.as_ref().map_or("-", |id| id.as_str());
        let _ = writeln!(
            out,
            "{:<20} {:<5} {:>4} {:<24} {}",
            issue.code.to_string(),
            if issue.is_hard() { "hard" } else { "soft" },
            day,
            truncate(exercise, 24),
            issue.message
        );
    }
    out
}

/// One-paragraph summary of a pipeline run.
pub fn outcome_summary(outcome: &PipelineOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Run {} ({} mode)", outcome.run_id, outcome.mode_used);
    let _ = writeln!(
        out,
        "  Result:    {} after {} repair attempt(s)",
        outcome.termination, outcome.attempts_used
    );
    let _ = writeln!(
        out,
        "  Accepted:  {}",
        if outcome.accepted { "yes" } else { "no" }
    );
    for fallback in &outcome.fallbacks {
        let _ = writeln!(
            out,
            "  Fallback:  {} ran locally ({})",
            fallback.stage, fallback.reason
        );
    }
    out
}

/// Catalog entries, one per row.
pub fn exercise_table<'a>(exercises: impl IntoIterator<Item = &'a Exercise>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<24} {:<28} {:<10} {:<20} MUSCLES",
        "ID", "NAME", "FUNCTION", "EQUIPMENT"
    );
    let _ = writeln!(out, "{}", "-".repeat(96));
    for e in exercises {
        let equipment: Vec<String> = e.equipment.iter().map(|q| q.to_string()).collect();
        let muscles: Vec<&str> = e.primary_muscles.iter().map(|m| m.as_str()).collect();
        let _ = writeln!(
            out,
            "{:<24} {:<28} {:<10} {:<20} {}",
            truncate(e.id.as_str(), 24),
            truncate(&e.name, 28),
            e.function.to_string(),
            equipment.join(","),
            muscles.join(", ")
        );
    }
    out
}

/// A model explanation: the overview, then one paragraph per day.
pub fn explanation(plan: &Plan, explained: &PlanExplanation) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", explained.overall.trim());
    for (day, summary) in plan.days.iter().zip(&explained.day_summaries) {
        let _ = writeln!(out);
        let _ = writeln!(out, "Day {}: {}", day.day_index + 1, day.label);
        let _ = writeln!(out, "  {}", summary.trim());
    }
    out
}
