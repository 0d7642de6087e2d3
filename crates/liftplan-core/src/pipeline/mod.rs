//! Pipeline orchestrator: filter, synthesize, then validate and repair
//! until the plan passes or the repair budget runs out.
//!
//! The backend (local or LLM-assisted) is picked once per run from whether
//! a model client is configured. LLM stages are retried under the
//! configured [`RetryPolicy`]; when they give up, that single stage falls
//! back to its local counterpart and the fallback is recorded in the
//! outcome.

pub mod state;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::allowed::{AllowedList, FilterError, filter};
use crate::catalog::Catalog;
use crate::llm::{RetryPolicy, StageOutcome, StructuredLlm, run_with_retry};
use crate::model::{Mode, Plan, UserProfile, ValidationIssue, has_hard};
use crate::repair::{LlmRepairer, LocalRepairer, Repairer, repair_local};
use crate::synth::{LlmSynthesizer, LocalSynthesizer, Synthesizer, generate_local};
use crate::validate::validate;

pub use state::{Stage, StageMachine};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do with a plan whose only remaining issues are soft.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftIssuePolicy {
    /// Accept the plan and report the issues.
    #[default]
    Tolerate,
    /// Report the plan as not accepted.
    Reject,
}

impl fmt::Display for SoftIssuePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Tolerate => "tolerate",
            Self::Reject => "reject",
        };
        f.write_str(s)
    }
}

/// Error returned when parsing an invalid soft issue policy string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid soft issue policy: {0:?} (expected tolerate or reject)")]
pub struct SoftIssuePolicyParseError(pub String);

impl FromStr for SoftIssuePolicy {
    type Err = SoftIssuePolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tolerate" => Ok(Self::Tolerate),
            "reject" => Ok(Self::Reject),
            other => Err(SoftIssuePolicyParseError(other.to_owned())),
        }
    }
}

pub const DEFAULT_MAX_REPAIR_ATTEMPTS: u32 = 3;

/// Knobs for a [`Pipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum validate/repair cycles per run.
    pub max_repair_attempts: u32,
    /// Retry budget for each LLM stage call.
    pub retry: RetryPolicy,
    pub soft_issue_policy: SoftIssuePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_repair_attempts: DEFAULT_MAX_REPAIR_ATTEMPTS,
            retry: RetryPolicy::default(),
            soft_issue_policy: SoftIssuePolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Why the validate/repair loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The final plan has no issues.
    Passed,
    /// The repair budget ran out with issues remaining.
    BudgetExhausted,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Passed => "passed",
            Self::BudgetExhausted => "budget_exhausted",
        };
        f.write_str(s)
    }
}

/// An LLM stage that gave up and was redone locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFallback {
    pub stage: Stage,
    pub reason: String,
}

/// Everything a caller gets back from a completed run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub plan: Plan,
    /// Issues left on the final plan.
    pub issues: Vec<ValidationIssue>,
    /// Backend selected for the run.
    pub mode_used: Mode,
    /// Repair attempts performed.
    pub attempts_used: u32,
    pub termination: Termination,
    /// Policy verdict: no hard issues, and soft issues tolerated or absent.
    pub accepted: bool,
    pub fallbacks: Vec<StageFallback>,
}

/// Ways a run can end without a plan.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    EmptyAllowedList(#[from] FilterError),

    #[error("pipeline run cancelled")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Strategy pair chosen once per run.
struct Strategies {
    mode: Mode,
    synthesizer: Box<dyn Synthesizer>,
    repairer: Box<dyn Repairer>,
}

impl Strategies {
    fn local() -> Self {
        Self {
            mode: Mode::Local,
            synthesizer: Box::new(LocalSynthesizer),
            repairer: Box::new(LocalRepairer),
        }
    }

    fn llm(client: Arc<dyn StructuredLlm>) -> Self {
        Self {
            mode: Mode::Llm,
            synthesizer: Box::new(LlmSynthesizer::new(client.clone())),
            repairer: Box::new(LlmRepairer::new(client)),
        }
    }
}

/// Runs plan synthesis for profiles against a shared catalog.
///
/// Cheap to share: concurrent runs only read the catalog and config.
#[derive(Clone)]
pub struct Pipeline {
    catalog: Arc<Catalog>,
    config: PipelineConfig,
    llm: Option<Arc<dyn StructuredLlm>>,
}

impl Pipeline {
    /// A local-only pipeline.
    pub fn new(catalog: Arc<Catalog>, config: PipelineConfig) -> Self {
        Self {
            catalog,
            config,
            llm: None,
        }
    }

    /// Enable LLM-assisted synthesis and repair.
    pub fn with_llm(mut self, client: Arc<dyn StructuredLlm>) -> Self {
        self.llm = Some(client);
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Backend a run would start with.
    pub fn mode(&self) -> Mode {
        if self.llm.is_some() {
            Mode::Llm
        } else {
            Mode::Local
        }
    }

    /// Run the pipeline for `profile`.
    ///
    /// Returns [`PipelineError::Cancelled`] if `cancel` fires before the run
    /// completes; no partial plan is returned in that case.
    pub async fn run(
        &self,
        profile: &UserProfile,
        seed: u64,
        cancel: CancellationToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        let strategies = match &self.llm {
            Some(client) => Strategies::llm(client.clone()),
            None => Strategies::local(),
        };
        self.start(profile, seed, &cancel, strategies).await
    }

    /// Run with local strategies only, without an async runtime.
    pub fn run_local(
        &self,
        profile: &UserProfile,
        seed: u64,
    ) -> Result<PipelineOutcome, PipelineError> {
        let cancel = CancellationToken::new();
        futures::executor::block_on(self.start(profile, seed, &cancel, Strategies::local()))
    }

    async fn start(
        &self,
        profile: &UserProfile,
        seed: u64,
        cancel: &CancellationToken,
        strategies: Strategies,
    ) -> Result<PipelineOutcome, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline", %run_id, seed, mode = %strategies.mode);
        self.execute(run_id, profile, seed, cancel, strategies)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        run_id: Uuid,
        profile: &UserProfile,
        seed: u64,
        cancel: &CancellationToken,
        strategies: Strategies,
    ) -> Result<PipelineOutcome, PipelineError> {
        let mut stage = Stage::Filter;
        let mut fallbacks = Vec::new();

        let allowed = match filter(&self.catalog, profile) {
            Ok(allowed) => allowed,
            Err(err) => {
                advance(&mut stage, Stage::Failed);
                tracing::warn!(error = %err, "no allowed exercises");
                return Err(err.into());
            }
        };
        advance(&mut stage, Stage::Synthesize);

        let mut plan = self
            .synthesize(&strategies, &allowed, profile, seed, cancel, &mut fallbacks)
            .await?;

        let max_attempts = self.config.max_repair_attempts;
        let mut attempts = 0u32;
        let issues = loop {
            advance(&mut stage, Stage::Validate);
            let issues = validate(&plan, profile, &allowed);

            let next = StageMachine::after_validate(&issues, attempts, max_attempts);
            advance(&mut stage, next);
            if next == Stage::Done {
                break issues;
            }

            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            attempts += 1;
            tracing::debug!(attempt = attempts, issues = issues.len(), "repairing plan");
            plan = self
                .repair(&strategies, &plan, &issues, &allowed, profile, cancel, &mut fallbacks)
                .await?;
            plan.meta.attempt_count = attempts;
        };

        let termination = if issues.is_empty() {
            Termination::Passed
        } else {
            Termination::BudgetExhausted
        };
        let accepted = !has_hard(&issues)
            && (issues.is_empty() || self.config.soft_issue_policy == SoftIssuePolicy::Tolerate);

        tracing::info!(
            %termination,
            attempts,
            remaining_issues = issues.len(),
            accepted,
            "pipeline finished"
        );

        Ok(PipelineOutcome {
            run_id,
            plan,
            issues,
            mode_used: strategies.mode,
            attempts_used: attempts,
            termination,
            accepted,
            fallbacks,
        })
    }

    async fn synthesize(
        &self,
        strategies: &Strategies,
        allowed: &AllowedList<'_>,
        profile: &UserProfile,
        seed: u64,
        cancel: &CancellationToken,
        fallbacks: &mut Vec<StageFallback>,
    ) -> Result<Plan, PipelineError> {
        let synthesizer = strategies.synthesizer.as_ref();
        let outcome = run_with_retry(&self.config.retry, cancel, "synthesize", move || {
            synthesizer.generate(allowed, profile, seed)
        })
        .await;

        match outcome {
            StageOutcome::Completed(plan) => Ok(plan),
            StageOutcome::Cancelled => Err(PipelineError::Cancelled),
            StageOutcome::Degraded(reason) => {
                tracing::warn!(%reason, "synthesis degraded, falling back to local");
                fallbacks.push(StageFallback {
                    stage: Stage::Synthesize,
                    reason,
                });
                Ok(generate_local(allowed, profile, seed))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn repair(
        &self,
        strategies: &Strategies,
        plan: &Plan,
        issues: &[ValidationIssue],
        allowed: &AllowedList<'_>,
        profile: &UserProfile,
        cancel: &CancellationToken,
        fallbacks: &mut Vec<StageFallback>,
    ) -> Result<Plan, PipelineError> {
        let repairer = strategies.repairer.as_ref();
        let outcome = run_with_retry(&self.config.retry, cancel, "repair", move || {
            repairer.repair(plan, issues, allowed, profile)
        })
        .await;

        match outcome {
            StageOutcome::Completed(repaired) => Ok(repaired),
            StageOutcome::Cancelled => Err(PipelineError::Cancelled),
            StageOutcome::Degraded(reason) => {
                tracing::warn!(%reason, "repair degraded, falling back to local");
                fallbacks.push(StageFallback {
                    stage: Stage::Repair,
                    reason,
                });
                Ok(repair_local(plan, issues, allowed, profile))
            }
        }
    }
}

/// Move to `to`, logging the transition.
fn advance(stage: &mut Stage, to: Stage) {
    debug_assert!(
        StageMachine::is_valid_transition(*stage, to),
        "invalid stage transition {stage} -> {to}"
    );
    tracing::debug!(from = %stage, to = %to, "stage transition");
    *stage = to;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Equipment, IssueCode};

    fn pipeline(config: PipelineConfig) -> Pipeline {
        Pipeline::new(Arc::new(Catalog::builtin()), config)
    }

    #[test]
    fn soft_issue_policy_parses() {
        assert_eq!("Reject".parse::<SoftIssuePolicy>(), Ok(SoftIssuePolicy::Reject));
        assert_eq!(
            "tolerate".parse::<SoftIssuePolicy>(),
            Ok(SoftIssuePolicy::Tolerate)
        );
        assert!("maybe".parse::<SoftIssuePolicy>().is_err());
        assert_eq!(SoftIssuePolicy::default(), SoftIssuePolicy::Tolerate);
    }

    #[test]
    fn local_run_passes_clean() {
        let profile = UserProfile::builder(3, 4)
            .equipment([Equipment::Bodyweight])
            .build()
            .unwrap();
        let outcome = pipeline(PipelineConfig::default())
            .run_local(&profile, 42)
            .unwrap();
        assert_eq!(outcome.termination, Termination::Passed);
        assert_eq!(outcome.mode_used, Mode::Local);
        assert_eq!(outcome.attempts_used, 0);
        assert!(outcome.accepted);
        assert!(outcome.fallbacks.is_empty());
    }

    #[test]
    fn empty_allowed_list_fails_before_synthesis() {
        let profile = UserProfile::builder(3, 4).build().unwrap();
        let err = pipeline(PipelineConfig::default())
            .run_local(&profile, 1)
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyAllowedList(_)));
    }

    #[test]
    fn unmet_soft_issue_exhausts_budget_and_policy_decides() {
        // Nothing available trains calves, so emphasis can never be met.
        let builder = || {
            UserProfile::builder(2, 3)
                .equipment([Equipment::Bodyweight])
                .emphasize("calves")
                .build()
                .unwrap()
        };
        let tolerate = pipeline(PipelineConfig {
            max_repair_attempts: 2,
            ..PipelineConfig::default()
        })
        .run_local(&builder(), 5)
        .unwrap();
        assert_eq!(tolerate.termination, Termination::BudgetExhausted);
        assert_eq!(tolerate.attempts_used, 2);
        assert_eq!(tolerate.plan.meta.attempt_count, 2);
        assert_eq!(tolerate.issues.len(), 1);
        assert_eq!(tolerate.issues[0].code, IssueCode::EmphasisUnmet);
        assert!(tolerate.accepted);

        let reject = pipeline(PipelineConfig {
            max_repair_attempts: 2,
            soft_issue_policy: SoftIssuePolicy::Reject,
            ..PipelineConfig::default()
        })
        .run_local(&builder(), 5)
        .unwrap();
        assert!(!reject.accepted);
        assert_eq!(reject.plan, tolerate.plan);
    }

    #[test]
    fn zero_budget_never_repairs() {
        let profile = UserProfile::builder(2, 3)
            .equipment([Equipment::Bodyweight])
            .emphasize("calves")
            .build()
            .unwrap();
        let outcome = pipeline(PipelineConfig {
            max_repair_attempts: 0,
            ..PipelineConfig::default()
        })
        .run_local(&profile, 5)
        .unwrap();
        assert_eq!(outcome.attempts_used, 0);
        assert_eq!(outcome.termination, Termination::BudgetExhausted);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let profile = UserProfile::builder(3, 4)
            .equipment([Equipment::Bodyweight])
            .build()
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = pipeline(PipelineConfig::default())
            .run(&profile, 1, cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[test]
    fn run_ids_are_unique() {
        let profile = UserProfile::builder(1, 2)
            .equipment([Equipment::Bodyweight])
            .build()
            .unwrap();
        let p = pipeline(PipelineConfig::default());
        let a = p.run_local(&profile, 1).unwrap();
        let b = p.run_local(&profile, 1).unwrap();
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.plan, b.plan);
    }
}
