//! `liftplan validate` command: check a saved plan against a profile.

use std::path::Path;

use anyhow::{Result, bail};

use liftplan_core::model::has_hard;
use liftplan_core::{filter, validate};

use crate::{input, render};

/// Run the validate command.
pub fn run_validate(
    plan_path: &Path,
    profile_path: &Path,
    catalog_path: Option<&Path>,
) -> Result<()> {
    let plan = input::load_plan(plan_path)?;
    let profile = input::load_profile(profile_path)?;
    let catalog = input::load_catalog(catalog_path)?;
    let allowed = filter(&catalog, &profile)?;

    let issues = validate(&plan, &profile, &allowed);
    if issues.is_empty() {
        println!(
            "Plan passes validation ({} days, {} blocks).",
            plan.days.len(),
            plan.total_blocks()
        );
        return Ok(());
    }

    print!("{}", render::issues_table(&issues));
    let hard = issues.iter().filter(|i| i.is_hard()).count();
    println!();
    println!("{} issue(s): {hard} hard, {} soft", issues.len(), issues.len() - hard);

    if has_hard(&issues) {
        bail!("plan has {hard} hard issue(s)");
    }
    Ok(())
}
