mod assist_cmd;
mod catalog_cmd;
mod config;
mod generate_cmd;
mod input;
mod render;
mod swap_cmd;
mod validate_cmd;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use liftplan_core::pipeline::SoftIssuePolicy;

use assist_cmd::PlanArgs;
use config::{LiftplanConfig, Overrides};
use generate_cmd::{GenerateArgs, OutputFormat};
use swap_cmd::SwapArgs;

#[derive(Parser)]
#[command(name = "liftplan", about = "Workout plan synthesis with validation and repair")]
struct Cli {
    /// Exercise catalog file (.toml or .json; defaults to the built-in catalog)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a liftplan config file
    Init {
        /// API key for the LLM provider (omit for local-only)
        #[arg(long)]
        api_key: Option<String>,
        /// Model identifier
        #[arg(long)]
        model: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Generate a plan for a profile
    Generate {
        /// Profile file (.toml or .json)
        #[arg(long)]
        profile: PathBuf,
        /// Seed for local synthesis (random if omitted)
        #[arg(long)]
        seed: Option<u64>,
        /// Never call the LLM, even if a key is configured
        #[arg(long)]
        local: bool,
        /// Override the configured model
        #[arg(long)]
        model: Option<String>,
        /// Maximum validate/repair cycles
        #[arg(long)]
        max_repair_attempts: Option<u32>,
        /// What to do when only soft issues remain: tolerate or reject
        #[arg(long)]
        soft_issues: Option<SoftIssuePolicy>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check a saved JSON plan against a profile
    Validate {
        /// Plan file written with `--format json`
        plan: PathBuf,
        /// Profile file (.toml or .json)
        #[arg(long)]
        profile: PathBuf,
    },
    /// Replace one exercise in a saved JSON plan with a similar one
    Swap {
        /// Plan file written with `--format json`
        plan: PathBuf,
        /// Profile file (.toml or .json)
        #[arg(long)]
        profile: PathBuf,
        /// Day number (1-based)
        #[arg(long)]
        day: usize,
        /// Exercise id to replace
        #[arg(long)]
        exercise: String,
        /// Never call the LLM, even if a key is configured
        #[arg(long)]
        local: bool,
        /// Override the configured model
        #[arg(long)]
        model: Option<String>,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Ask the LLM to explain a saved JSON plan
    Explain {
        /// Plan file written with `--format json`
        plan: PathBuf,
        /// Profile file (.toml or .json)
        #[arg(long)]
        profile: PathBuf,
        /// Override the configured model
        #[arg(long)]
        model: Option<String>,
    },
    /// Ask the LLM a question about a saved JSON plan
    Ask {
        /// Plan file written with `--format json`
        plan: PathBuf,
        /// The question
        question: String,
        /// Profile file (.toml or .json)
        #[arg(long)]
        profile: PathBuf,
        /// Override the configured model
        #[arg(long)]
        model: Option<String>,
    },
    /// List catalog exercises (only the allowed ones with --profile)
    Catalog {
        /// Profile file to filter by
        #[arg(long)]
        profile: Option<PathBuf>,
    },
    /// Print shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Execute the `liftplan init` command: write config file.
fn cmd_init(api_key: Option<String>, model: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        llm: config::LlmSection {
            api_key: api_key.clone(),
            model: model.clone(),
            ..config::LlmSection::default()
        },
        pipeline: config::PipelineSection {
            max_repair_attempts: Some(liftplan_core::pipeline::DEFAULT_MAX_REPAIR_ATTEMPTS),
            soft_issue_policy: Some(SoftIssuePolicy::default()),
        },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    match &api_key {
        Some(key) => println!("  llm.api_key = {}", config::mask_key(key)),
        None => println!("  llm.api_key not set (plans are generated locally)"),
    }
    if let Some(model) = &model {
        println!("  llm.model = {model}");
    }
    println!();
    println!("Next: run `liftplan generate --profile <file>`.");

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let catalog = cli.catalog.as_deref();

    match cli.command {
        Commands::Init {
            api_key,
            model,
            force,
        } => {
            cmd_init(api_key, model, force)?;
        }
        Commands::Generate {
            profile,
            seed,
            local,
            model,
            max_repair_attempts,
            soft_issues,
            format,
            output,
        } => {
            let resolved = LiftplanConfig::resolve(&Overrides {
                model: model.as_deref(),
                max_repair_attempts,
                soft_issue_policy: soft_issues,
                local,
            })?;
            let args = GenerateArgs {
                profile: &profile,
                catalog,
                seed,
                format,
                output: output.as_deref(),
            };
            generate_cmd::run_generate(args, resolved).await?;
        }
        Commands::Validate { plan, profile } => {
            validate_cmd::run_validate(&plan, &profile, catalog)?;
        }
        Commands::Swap {
            plan,
            profile,
            day,
            exercise,
            local,
            model,
            output,
        } => {
            let resolved = LiftplanConfig::resolve(&Overrides {
                model: model.as_deref(),
                local,
                ..Overrides::default()
            })?;
            let args = SwapArgs {
                plan: &plan,
                profile: &profile,
                catalog,
                day,
                exercise: &exercise,
                output: output.as_deref(),
            };
            swap_cmd::run_swap(args, resolved).await?;
        }
        Commands::Explain {
            plan,
            profile,
            model,
        } => {
            let resolved = LiftplanConfig::resolve(&Overrides {
                model: model.as_deref(),
                ..Overrides::default()
            })?;
            let args = PlanArgs {
                plan: &plan,
                profile: &profile,
                catalog,
            };
            assist_cmd::run_explain(args, resolved).await?;
        }
        Commands::Ask {
            plan,
            question,
            profile,
            model,
        } => {
            let resolved = LiftplanConfig::resolve(&Overrides {
                model: model.as_deref(),
                ..Overrides::default()
            })?;
            let args = PlanArgs {
                plan: &plan,
                profile: &profile,
                catalog,
            };
            assist_cmd::run_ask(args, &question, resolved).await?;
        }
        Commands::Catalog { profile } => {
            catalog_cmd::run_catalog(catalog, profile.as_deref())?;
        }
        Commands::Completions { shell } => {
            print_completions(shell, &mut std::io::stdout());
        }
    }

    Ok(())
}

fn print_completions(shell: Shell, out: &mut dyn std::io::Write) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, out);
}
