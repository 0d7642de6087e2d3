//! Auxiliary LLM jobs on a finished plan.
//!
//! These run outside the synthesis pipeline: explaining a plan, answering a
//! question about it, and swapping a single exercise. Each is one
//! structured-output call driven by the same [`RetryPolicy`] as the
//! pipeline stages. Only the swap has a local fallback
//! ([`replace_exercise`]); explanations and answers report
//! [`AssistError::Unavailable`] when the model gives up.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::allowed::AllowedList;
use crate::catalog::Catalog;
use crate::llm::{
    LlmError, LlmTask, RetryPolicy, StageOutcome, StageResult, StructuredLlm, StructuredRequest,
    run_with_retry,
};
use crate::model::{DayPlan, Exercise, ExerciseId, Mode, Plan, UserProfile};
use crate::repair::{ReplaceError, replace_exercise};

const EXPLAIN_INSTRUCTIONS: &str = "\
You are a strength coach. Explain the weekly training plan in `plan` to the \
athlete described by `profile`. Return JSON matching the provided schema: \
`overall` is a short paragraph on how the week fits together, and \
`day_summaries` has exactly one sentence per day, in day order. Refer to \
exercises by the names in `exercises`.";

const QUESTION_INSTRUCTIONS: &str = "\
You are a strength coach. Answer `question` about the weekly training plan \
in `plan` for the athlete described by `profile`. Be concise and only \
discuss what the plan contains. Return JSON matching the provided schema.";

const REPLACE_INSTRUCTIONS: &str = "\
You are a strength coach. The athlete wants to swap `exercise_id` on day \
`day_index` of `plan`. Choose one replacement from `allowed_exercises` that \
trains a similar movement or muscles and is not already on that day. Return \
JSON matching the provided schema with its id and a one-sentence rationale.";

/// A model's explanation of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlanExplanation {
    pub overall: String,
    /// One entry per day, in day order.
    pub day_summaries: Vec<String>,
}

/// A model's answer to a question about a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlanAnswer {
    pub answer: String,
}

/// The exercise a model picked to replace another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReplacementChoice {
    pub exercise_id: ExerciseId,
    #[serde(default)]
    pub rationale: String,
}

/// Result of [`Assistant::replace`].
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    pub plan: Plan,
    /// Exercise now in the slot, or `None` if the plan is unchanged.
    pub replaced_with: Option<ExerciseId>,
    /// Backend that chose the replacement.
    pub mode: Mode,
    pub rationale: Option<String>,
    /// Why the model was not used, when the local swap stood in for it.
    pub fallback: Option<String>,
}

impl Replacement {
    /// Wrap a local [`replace_exercise`] result computed from `before`.
    pub fn local(before: &Plan, after: Plan, day_index: usize) -> Self {
        let replaced_with = replaced_id(before, &after, day_index);
        Self {
            plan: after,
            replaced_with,
            mode: Mode::Local,
            rationale: None,
            fallback: None,
        }
    }
}

/// Ways an auxiliary job can fail.
#[derive(Debug, Error)]
pub enum AssistError {
    #[error(transparent)]
    Replace(#[from] ReplaceError),

    #[error("LLM unavailable: {0}")]
    Unavailable(String),

    #[error("LLM job cancelled")]
    Cancelled,
}

fn schema_of<T: JsonSchema>() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(serde_json::Value::Null)
}

fn parse<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, LlmError> {
    serde_json::from_value(value).map_err(|e| LlmError::SchemaViolation(e.to_string()))
}

fn non_empty(field: &str, text: &str) -> Result<(), LlmError> {
    if text.trim().is_empty() {
        return Err(LlmError::SchemaViolation(format!("{field} is empty")));
    }
    Ok(())
}

/// Catalog entries for every exercise in the plan, in first-seen order.
fn plan_exercises<'a>(plan: &Plan, catalog: &'a Catalog) -> Vec<&'a Exercise> {
    let mut seen: Vec<&'a Exercise> = Vec::new();
    for exercise in plan
        .days
        .iter()
        .flat_map(DayPlan::exercise_ids)
        .filter_map(|id| catalog.get(id))
    {
        if !seen.iter().any(|e| e.id == exercise.id) {
            seen.push(exercise);
        }
    }
    seen
}

/// Runs auxiliary jobs against a structured-output model.
#[derive(Clone)]
pub struct Assistant {
    client: Arc<dyn StructuredLlm>,
    retry: RetryPolicy,
}

impl Assistant {
    pub fn new(client: Arc<dyn StructuredLlm>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    async fn call<T, F>(
        &self,
        request: StructuredRequest,
        cancel: &CancellationToken,
        check: F,
    ) -> StageOutcome<T>
    where
        F: Fn(serde_json::Value) -> Result<T, LlmError>,
    {
        let stage = format!("{:?}", request.task).to_lowercase();
        let request = &request;
        let check = &check;
        run_with_retry(&self.retry, cancel, &stage, || async move {
            match self.client.complete_json(request).await.and_then(check) {
                Ok(value) => StageResult::Ok(value),
                Err(err) => err.into(),
            }
        })
        .await
    }

    /// Ask the model to explain `plan`.
    pub async fn explain(
        &self,
        plan: &Plan,
        profile: &UserProfile,
        catalog: &Catalog,
        cancel: &CancellationToken,
    ) -> Result<PlanExplanation, AssistError> {
        let request = StructuredRequest {
            task: LlmTask::Explain,
            schema_name: "plan_explanation".to_owned(),
            schema: schema_of::<PlanExplanation>(),
            instructions: EXPLAIN_INSTRUCTIONS.to_owned(),
            context: serde_json::json!({
                "profile": profile,
                "plan": plan,
                "exercises": plan_exercises(plan, catalog),
            }),
        };
        let days = plan.days.len();
        let outcome = self
            .call(request, cancel, |value| {
                let explanation: PlanExplanation = parse(value)?;
                non_empty("overall", &explanation.overall)?;
                if explanation.day_summaries.len() != days {
                    return Err(LlmError::SchemaViolation(format!(
                        "{} day summaries for a {days}-day plan",
                        explanation.day_summaries.len()
                    )));
                }
                Ok(explanation)
            })
            .await;
        finish(outcome)
    }

    /// Ask the model a free-form question about `plan`.
    pub async fn answer(
        &self,
        plan: &Plan,
        profile: &UserProfile,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<PlanAnswer, AssistError> {
        let request = StructuredRequest {
            task: LlmTask::Question,
            schema_name: "plan_answer".to_owned(),
            schema: schema_of::<PlanAnswer>(),
            instructions: QUESTION_INSTRUCTIONS.to_owned(),
            context: serde_json::json!({
                "profile": profile,
                "plan": plan,
                "question": question,
            }),
        };
        let outcome = self
            .call(request, cancel, |value| {
                let answer: PlanAnswer = parse(value)?;
                non_empty("answer", &answer.answer)?;
                Ok(answer)
            })
            .await;
        finish(outcome)
    }

    /// Swap one exercise, letting the model choose the replacement.
    ///
    /// The day and exercise are checked before any call is made. A choice
    /// that is not allowed, already on the day, or the same exercise counts
    /// as a schema violation and is retried; when the model gives up the
    /// local [`replace_exercise`] result is returned instead.
    pub async fn replace(
        &self,
        plan: &Plan,
        day_index: usize,
        exercise_id: &ExerciseId,
        allowed: &AllowedList<'_>,
        profile: &UserProfile,
        cancel: &CancellationToken,
    ) -> Result<Replacement, AssistError> {
        let local = replace_exercise(plan, day_index, exercise_id, allowed)?;

        let request = StructuredRequest {
            task: LlmTask::Replace,
            schema_name: "replacement_choice".to_owned(),
            schema: schema_of::<ReplacementChoice>(),
            instructions: REPLACE_INSTRUCTIONS.to_owned(),
            context: serde_json::json!({
                "profile": profile,
                "plan": plan,
                "day_index": day_index,
                "exercise_id": exercise_id,
                "allowed_exercises": allowed.exercises(),
            }),
        };
        let outcome = self
            .call(request, cancel, |value| {
                let choice: ReplacementChoice = parse(value)?;
                let updated =
                    swap_block(plan, day_index, exercise_id, &choice.exercise_id, allowed)?;
                Ok((updated, choice))
            })
            .await;

        match outcome {
            StageOutcome::Completed((updated, choice)) => {
                tracing::info!(
                    day = day_index,
                    from = %exercise_id,
                    to = %choice.exercise_id,
                    "model replaced exercise"
                );
                Ok(Replacement {
                    plan: updated,
                    replaced_with: Some(choice.exercise_id),
                    mode: Mode::Llm,
                    rationale: Some(choice.rationale).filter(|r| !r.trim().is_empty()),
                    fallback: None,
                })
            }
            StageOutcome::Degraded(reason) => {
                tracing::warn!(%reason, "replace fell back to local swap");
                Ok(Replacement {
                    fallback: Some(reason),
                    ..Replacement::local(plan, local, day_index)
                })
            }
            StageOutcome::Cancelled => Err(AssistError::Cancelled),
        }
    }
}

fn finish<T>(outcome: StageOutcome<T>) -> Result<T, AssistError> {
    match outcome {
        StageOutcome::Completed(value) => Ok(value),
        StageOutcome::Degraded(reason) => Err(AssistError::Unavailable(reason)),
        StageOutcome::Cancelled => Err(AssistError::Cancelled),
    }
}

/// Put `replacement` in the slot held by `original` on `day_index`.
fn swap_block(
    plan: &Plan,
    day_index: usize,
    original: &ExerciseId,
    replacement: &ExerciseId,
    allowed: &AllowedList<'_>,
) -> Result<Plan, LlmError> {
    if !allowed.contains(replacement) {
        return Err(LlmError::SchemaViolation(format!(
            "{replacement} is not an allowed exercise"
        )));
    }
    let mut updated = plan.clone();
    let day = updated
        .days
        .iter_mut()
        .find(|d| d.day_index == day_index)
        .ok_or_else(|| LlmError::SchemaViolation(format!("plan has no day {day_index}")))?;
    if day.contains(replacement) {
        return Err(LlmError::SchemaViolation(format!(
            "{replacement} is already on day {day_index}"
        )));
    }
    let block = day
        .blocks
        .iter_mut()
        .find(|b| &b.exercise_id == original)
        .ok_or_else(|| {
            LlmError::SchemaViolation(format!("day {day_index} does not contain {original}"))
        })?;
    block.exercise_id = replacement.clone();
    Ok(updated)
}

/// The id that differs between `before` and `after` on `day_index`.
fn replaced_id(before: &Plan, after: &Plan, day_index: usize) -> Option<ExerciseId> {
    let find = |p: &Plan| p.days.iter().find(|d| d.day_index == day_index).cloned();
    let (old, new) = (find(before)?, find(after)?);
    new.exercise_ids().find(|id| !old.contains(id)).cloned()
}
