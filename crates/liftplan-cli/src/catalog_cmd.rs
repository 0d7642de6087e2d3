//! `liftplan catalog` command: list the catalog, or the part a profile allows.

use std::path::Path;

use anyhow::Result;

use liftplan_core::filter;

use crate::{input, render};

/// Run the catalog command.
pub fn run_catalog(catalog_path: Option<&Path>, profile_path: Option<&Path>) -> Result<()> {
    let catalog = input::load_catalog(catalog_path)?;

    match profile_path {
        Some(path) => {
            let profile = input::load_profile(path)?;
            let allowed = filter(&catalog, &profile)?;
            print!("{}", render::exercise_table(allowed.iter()));
            println!();
            println!("{} of {} exercises allowed", allowed.len(), catalog.len());
        }
        None => {
            print!("{}", render::exercise_table(catalog.iter()));
            println!();
            println!("{} exercises", catalog.len());
        }
    }
    Ok(())
}
