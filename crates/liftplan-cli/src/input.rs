//! Loading profiles, catalogs, and plans from disk.

use std::path::Path;

use anyhow::{Context, Result};

use liftplan_core::catalog::Catalog;
use liftplan_core::model::{Plan, UserProfile};

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

/// Read a profile from a `.toml` file, or JSON for any other extension.
pub fn load_profile(path: &Path) -> Result<UserProfile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile {}", path.display()))?;
    let profile = if is_toml(path) {
        toml::from_str(&contents).with_context(|| format!("invalid profile {}", path.display()))?
    } else {
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid profile {}", path.display()))?
    };
    Ok(profile)
}

/// The catalog at `path`, or the built-in one.
pub fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    match path {
        Some(path) => Catalog::from_path(path),
        None => Ok(Catalog::builtin()),
    }
}

/// Read a plan previously written with `--format json`.
///
/// Day indices are rewritten to match positions, so a hand-edited file with
/// repeated or out-of-range indices still addresses each day uniquely.
pub fn load_plan(path: &Path) -> Result<Plan> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read plan {}", path.display()))?;
    let mut plan: Plan = serde_json::from_str(&contents)
        .with_context(|| format!("invalid plan {}", path.display()))?;
    if plan.renumber_days() {
        tracing::warn!(
            path = %path.display(),
            "plan day indices did not match positions; renumbered"
        );
    }
    Ok(plan)
}
