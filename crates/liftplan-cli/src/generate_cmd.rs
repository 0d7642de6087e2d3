//! `liftplan generate` command: run the pipeline for a profile and write the plan.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use tokio_util::sync::CancellationToken;

use liftplan_core::catalog::Catalog;
use liftplan_core::export;
use liftplan_core::model::Plan;
use liftplan_core::pipeline::Pipeline;

use crate::config::LiftplanConfig;
use crate::{input, render};

/// Output format for a generated plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
    Markdown,
}

/// Render `plan` in `format`.
pub fn render_plan(plan: &Plan, catalog: &Catalog, format: OutputFormat) -> Result<String> {
    let rendered = match format {
        OutputFormat::Table => render::plan_table(plan, catalog, chrono::Utc::now()),
        OutputFormat::Json => {
            let mut json = export::to_json(plan).context("failed to serialize plan")?;
            json.push('\n');
            json
        }
        OutputFormat::Csv => export::to_csv(plan, catalog),
        OutputFormat::Markdown => export::to_markdown(plan, catalog),
    };
    Ok(rendered)
}

/// Write `contents` to `output`, or stdout when no path is given.
pub fn write_output(contents: &str, output: Option<&Path>) -> Result<()> {
    let mut writer: Box<dyn Write> = if let Some(path) = output {
        Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("cannot create output file: {}", path.display()))?,
        )
    } else {
        Box::new(std::io::stdout().lock())
    };
    writer.write_all(contents.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Cancel `token` on Ctrl-C.
pub fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            token.cancel();
        }
    });
}

pub struct GenerateArgs<'a> {
    pub profile: &'a Path,
    pub catalog: Option<&'a Path>,
    pub seed: Option<u64>,
    pub format: OutputFormat,
    pub output: Option<&'a Path>,
}

/// Run the generate command.
pub async fn run_generate(args: GenerateArgs<'_>, config: LiftplanConfig) -> Result<()> {
    use rand::Rng;

    let profile = input::load_profile(args.profile)?;
    let catalog = Arc::new(input::load_catalog(args.catalog)?);
    let seed = args.seed.unwrap_or_else(|| rand::rng().random());

    let client = config.llm_client()?;
    let mut pipeline = Pipeline::new(catalog.clone(), config.pipeline);
    if let Some(client) = client {
        tracing::info!(model = %client.model(), "using LLM-assisted synthesis");
        pipeline = pipeline.with_llm(client);
    }

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let outcome = pipeline.run(&profile, seed, cancel).await?;

    let rendered = render_plan(&outcome.plan, &catalog, args.format)?;
    write_output(&rendered, args.output)?;
    if let Some(path) = args.output {
        println!(
            "Wrote {}-day plan ({} blocks) to {}",
            outcome.plan.days.len(),
            outcome.plan.total_blocks(),
            path.display()
        );
    }

    eprint!("{}", render::outcome_summary(&outcome));
    eprintln!("  Seed:      {seed}");
    if !outcome.issues.is_empty() {
        eprintln!();
        eprint!("{}", render::issues_table(&outcome.issues));
    }

    if !outcome.accepted {
        bail!(
            "plan not accepted: {} issue(s) remain after {} repair attempt(s)",
            outcome.issues.len(),
            outcome.attempts_used
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use liftplan_test_utils::{mixed_catalog, plan_of};

    #[test]
    fn every_format_renders() {
        let catalog = mixed_catalog();
        let plan = plan_of(&[&["push_up", "pull_up"]]);

        let json = render_plan(&plan, &catalog, OutputFormat::Json).unwrap();
        let back: Plan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);

        let csv = render_plan(&plan, &catalog, OutputFormat::Csv).unwrap();
        assert_eq!(csv.lines().count(), 3);

        let md = render_plan(&plan, &catalog, OutputFormat::Markdown).unwrap();
        assert!(md.starts_with("# Training Plan (1 days)"));

        let table = render_plan(&plan, &catalog, OutputFormat::Table).unwrap();
        assert!(table.contains("Pull-up"));
    }

    #[test]
    fn write_output_creates_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("plan.md");
        write_output("# hello\n", Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hello\n");
    }

    #[test]
    fn write_output_reports_bad_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("missing").join("plan.md");
        let msg = format!("{:#}", write_output("x", Some(&path)).unwrap_err());
        assert!(msg.contains("cannot create output file"), "{msg}");
    }
}
