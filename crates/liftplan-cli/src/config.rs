//! Configuration file management for liftplan.
//!
//! Provides a TOML-based config file at `~/.config/liftplan/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use liftplan_core::assist::Assistant;
use liftplan_core::llm::{ChatCompletionsClient, LlmSettings, RetryPolicy, StructuredLlm};
use liftplan_core::pipeline::{PipelineConfig, SoftIssuePolicy};

pub const ENV_API_KEY: &str = "LIFTPLAN_API_KEY";
pub const ENV_MODEL: &str = "LIFTPLAN_MODEL";
pub const ENV_BASE_URL: &str = "LIFTPLAN_BASE_URL";
pub const ENV_MAX_REPAIR_ATTEMPTS: &str = "LIFTPLAN_MAX_REPAIR_ATTEMPTS";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Attempts per LLM stage call, including the first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PipelineSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_repair_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_issue_policy: Option<SoftIssuePolicy>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the liftplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/liftplan` or `~/.config/liftplan`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("liftplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("liftplan")
}

/// Return the path to the liftplan config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load the config file if there is one. A file that exists but does not
/// parse is an error.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // The file may hold an API key.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

/// Show only the ends of a secret.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line; they win over everything else.
#[derive(Debug, Default)]
pub struct Overrides<'a> {
    pub model: Option<&'a str>,
    pub max_repair_attempts: Option<u32>,
    pub soft_issue_policy: Option<SoftIssuePolicy>,
    /// Skip the model even when a key is configured.
    pub local: bool,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct LiftplanConfig {
    /// `None` means the run is local-only.
    pub llm: Option<LlmSettings>,
    pub pipeline: PipelineConfig,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl LiftplanConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - API key: `LIFTPLAN_API_KEY` env > `llm.api_key`; absent means local-only
    /// - Model: `--model` > `LIFTPLAN_MODEL` env > `llm.model` > provider default
    /// - Base URL: `LIFTPLAN_BASE_URL` env > `llm.base_url` > provider default
    /// - Repair budget: `--max-repair-attempts` > `LIFTPLAN_MAX_REPAIR_ATTEMPTS` env
    ///   > `pipeline.max_repair_attempts` > 3
    pub fn resolve(overrides: &Overrides<'_>) -> Result<Self> {
        let file = load_config()?.unwrap_or_default();
        Self::resolve_with(overrides, file)
    }

    fn resolve_with(overrides: &Overrides<'_>, file: ConfigFile) -> Result<Self> {
        let defaults = PipelineConfig::default();

        let max_repair_attempts = if let Some(n) = overrides.max_repair_attempts {
            n
        } else if let Some(raw) = env_var(ENV_MAX_REPAIR_ATTEMPTS) {
            raw.trim()
                .parse()
                .with_context(|| format!("{ENV_MAX_REPAIR_ATTEMPTS} is not a number: {raw}"))?
        } else {
            file.pipeline
                .max_repair_attempts
                .unwrap_or(defaults.max_repair_attempts)
        };

        let soft_issue_policy = overrides
            .soft_issue_policy
            .or(file.pipeline.soft_issue_policy)
            .unwrap_or(defaults.soft_issue_policy);

        let retry = match file.llm.max_retries {
            Some(max_attempts) => RetryPolicy {
                max_attempts,
                ..RetryPolicy::default()
            },
            None => defaults.retry,
        };

        let api_key = env_var(ENV_API_KEY).or(file.llm.api_key.filter(|k| !k.trim().is_empty()));
        let llm = match api_key {
            Some(key) if !overrides.local => {
                let mut settings = LlmSettings::new(key);
                if let Some(model) = overrides
                    .model
                    .map(str::to_owned)
                    .or_else(|| env_var(ENV_MODEL))
                    .or(file.llm.model)
                {
                    settings = settings.model(model);
                }
                if let Some(base_url) = env_var(ENV_BASE_URL).or(file.llm.base_url) {
                    settings = settings.base_url(base_url);
                }
                if let Some(temperature) = file.llm.temperature {
                    settings = settings.temperature(temperature);
                }
                if let Some(secs) = file.llm.timeout_secs {
                    settings = settings.timeout(Duration::from_secs(secs));
                }
                Some(settings)
            }
            _ => None,
        };

        Ok(Self {
            llm,
            pipeline: PipelineConfig {
                max_repair_attempts,
                retry,
                soft_issue_policy,
            },
        })
    }

    /// HTTP model client for the resolved settings, or `None` when local-only.
    pub fn llm_client(&self) -> Result<Option<Arc<dyn StructuredLlm>>> {
        let Some(settings) = &self.llm else {
            return Ok(None);
        };
        let client: Arc<dyn StructuredLlm> = Arc::new(
            ChatCompletionsClient::new(settings.clone()).context("failed to build LLM client")?,
        );
        Ok(Some(client))
    }

    /// Runner for the auxiliary jobs, sharing the stage retry policy.
    pub fn assistant(&self) -> Result<Option<Assistant>> {
        Ok(self
            .llm_client()?
            .map(|client| Assistant::new(client, self.pipeline.retry.clone())))
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
