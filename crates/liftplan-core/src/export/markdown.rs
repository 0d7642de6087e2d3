use std::fmt;

use crate::catalog::Catalog;
use crate::model::Plan;

/// Escape pipes so cell content cannot break the table.
fn cell(value: &str) -> String {
    value.replace('|', "\\|")
}

/// Render `plan` as a Markdown document.
///
/// ```text
/// # Training Plan (3 days)
///
/// ## Day 1: Push
///
/// | Exercise | Muscles | Function | Equipment | Sets | Reps | Rest |
/// ...
///
/// ### Weekly focus
///
/// - chest: 4
/// ```
pub fn write_markdown<W: fmt::Write>(plan: &Plan, catalog: &Catalog, out: &mut W) -> fmt::Result {
    writeln!(out, "# Training Plan ({} days)", plan.days.len())?;

    for day in &plan.days {
        writeln!(out)?;
        if day.label.is_empty() {
            writeln!(out, "## Day {}", day.day_index + 1)?;
        } else {
            writeln!(out, "## Day {}: {}", day.day_index + 1, day.label)?;
        }
        writeln!(out)?;

        if day.blocks.is_empty() {
            writeln!(out, "_Rest day._")?;
            continue;
        }

        writeln!(
            out,
            "| Exercise | Muscles | Function | Equipment | Sets | Reps | Rest |"
        )?;
        writeln!(out, "|---|---|---|---|---|---|---|")?;
        for block in &day.blocks {
            let scheme = &block.set_scheme;
            match catalog.get(&block.exercise_id) {
                Some(e) => {
                    let name = match &e.url {
                        Some(url) => format!("[{}]({url})", cell(&e.name)),
                        None => cell(&e.name),
                    };
                    let muscles: Vec<&str> = e.primary_muscles.iter().map(|m| m.as_str()).collect();
                    let equipment: Vec<String> =
                        e.equipment.iter().map(|q| q.to_string()).collect();
                    writeln!(
                        out,
                        "| {name} | {} | {} | {} | {} | {} | {}s |",
                        muscles.join(", "),
                        e.function,
                        equipment.join(", "),
                        scheme.sets,
                        scheme.reps,
                        scheme.rest_seconds,
                    )?;
                }
                None => {
                    writeln!(
                        out,
                        "| {} | | | | {} | {} | {}s |",
                        cell(block.exercise_id.as_str()),
                        scheme.sets,
                        scheme.reps,
                        scheme.rest_seconds,
                    )?;
                }
            }
        }
    }

    let focus = plan.weekly_focus(catalog);
    if !focus.is_empty() {
        writeln!(out)?;
        writeln!(out, "### Weekly focus")?;
        writeln!(out)?;
        for (muscle, count) in &focus {
            writeln!(out, "- {muscle}: {count}")?;
        }
    }
    Ok(())
}

/// [`write_markdown`] into a fresh string.
pub fn to_markdown(plan: &Plan, catalog: &Catalog) -> String {
    let mut out = String::new();
    // fmt::Write for String is infallible.
    let _ = write_markdown(plan, catalog, &mut out);
    out
}
