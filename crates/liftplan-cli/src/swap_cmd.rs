//! `liftplan swap` command: replace one exercise in a saved plan.
//!
//! With a model configured the replacement is chosen by the model, falling
//! back to the local similarity swap; otherwise the local swap is used
//! directly.

use std::path::Path;

use anyhow::{Result, anyhow, bail};
use tokio_util::sync::CancellationToken;

use liftplan_core::assist::{AssistError, Replacement};
use liftplan_core::export;
use liftplan_core::filter;
use liftplan_core::model::ExerciseId;
use liftplan_core::repair::{ReplaceError, replace_exercise};

use crate::config::LiftplanConfig;
use crate::generate_cmd::{cancel_on_interrupt, write_output};
use crate::input;

pub struct SwapArgs<'a> {
    pub plan: &'a Path,
    pub profile: &'a Path,
    pub catalog: Option<&'a Path>,
    /// 1-based day number as shown in tables.
    pub day: usize,
    pub exercise: &'a str,
    pub output: Option<&'a Path>,
}

/// Map a 0-based replacement error onto the 1-based day the user typed.
fn replace_error(err: ReplaceError, day: usize) -> anyhow::Error {
    match err {
        ReplaceError::UnknownDay(_) => anyhow!("plan has no day {day}"),
        ReplaceError::ExerciseNotInDay { exercise_id, .. } => {
            anyhow!("day {day} does not contain {exercise_id}")
        }
    }
}

/// Run the swap command. The updated plan is written as JSON.
pub async fn run_swap(args: SwapArgs<'_>, config: LiftplanConfig) -> Result<()> {
    if args.day == 0 {
        bail!("day numbers start at 1");
    }
    let plan = input::load_plan(args.plan)?;
    let profile = input::load_profile(args.profile)?;
    let catalog = input::load_catalog(args.catalog)?;
    let allowed = filter(&catalog, &profile)?;

    let day_index = args.day - 1;
    let id = ExerciseId::new(args.exercise);

    let swapped = match config.assistant()? {
        Some(assistant) => {
            let cancel = CancellationToken::new();
            cancel_on_interrupt(cancel.clone());
            assistant
                .replace(&plan, day_index, &id, &allowed, &profile, &cancel)
                .await
                .map_err(|err| match err {
                    AssistError::Replace(err) => replace_error(err, args.day),
                    other => anyhow!(other),
                })?
        }
        None => {
            let updated = replace_exercise(&plan, day_index, &id, &allowed)
                .map_err(|err| replace_error(err, args.day))?;
            Replacement::local(&plan, updated, day_index)
        }
    };

    match &swapped.replaced_with {
        Some(new) => eprintln!("Day {}: {id} -> {new} ({})", args.day, swapped.mode),
        None => eprintln!("No similar allowed exercise for {id}; plan unchanged."),
    }
    if let Some(rationale) = &swapped.rationale {
        eprintln!("  {rationale}");
    }
    if let Some(reason) = &swapped.fallback {
        eprintln!("  Model unavailable ({reason}); used the local swap.");
    }

    let mut json = export::to_json(&swapped.plan)?;
    json.push('\n');
    write_output(&json, args.output)
}
