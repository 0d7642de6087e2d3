//! `liftplan explain` and `liftplan ask`: model-backed commentary on a
//! saved plan. Both need a configured model.

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use tokio_util::sync::CancellationToken;

use liftplan_core::assist::Assistant;

use crate::config::{self, ENV_API_KEY, LiftplanConfig};
use crate::generate_cmd::cancel_on_interrupt;
use crate::{input, render};

pub struct PlanArgs<'a> {
    pub plan: &'a Path,
    pub profile: &'a Path,
    pub catalog: Option<&'a Path>,
}

fn require_assistant(config: &LiftplanConfig) -> Result<Assistant> {
    config.assistant()?.ok_or_else(|| {
        anyhow!(
            "this command needs an LLM: set {ENV_API_KEY} or llm.api_key in {}",
            config::config_path().display()
        )
    })
}

fn interruptible() -> CancellationToken {
    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());
    cancel
}

/// Run the explain command.
pub async fn run_explain(args: PlanArgs<'_>, config: LiftplanConfig) -> Result<()> {
    let assistant = require_assistant(&config)?;
    let plan = input::load_plan(args.plan)?;
    let profile = input::load_profile(args.profile)?;
    let catalog = input::load_catalog(args.catalog)?;

    let explained = assistant
        .explain(&plan, &profile, &catalog, &interruptible())
        .await
        .context("failed to explain plan")?;
    print!("{}", render::explanation(&plan, &explained));
    Ok(())
}

/// Run the ask command.
pub async fn run_ask(args: PlanArgs<'_>, question: &str, config: LiftplanConfig) -> Result<()> {
    if question.trim().is_empty() {
        bail!("question is empty");
    }
    let assistant = require_assistant(&config)?;
    let plan = input::load_plan(args.plan)?;
    let profile = input::load_profile(args.profile)?;

    let answer = assistant
        .answer(&plan, &profile, question.trim(), &interruptible())
        .await
        .context("failed to answer question")?;
    println!("{}", answer.answer.trim());
    Ok(())
}
