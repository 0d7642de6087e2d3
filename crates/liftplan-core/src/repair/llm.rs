use std::sync::Arc;

use async_trait::async_trait;

use super::Repairer;
use crate::allowed::AllowedList;
use crate::llm::{LlmTask, StageResult, StructuredLlm, StructuredRequest};
use crate::model::{Mode, Plan, PlanDraft, PlanMeta, UserProfile, ValidationIssue};
use crate::synth::llm::plan_from_reply;

const INSTRUCTIONS: &str = "\
You are a strength coach fixing a weekly training plan. Return the corrected \
plan as JSON matching the provided schema. Resolve every entry in `issues` \
while changing as little as possible. Keep the same number of days as \
`plan`. Only use ids from `allowed_exercises`, never repeat an exercise \
within a day, and keep each day within `profile.max_exercises_per_day`.";

/// [`Repairer`] that asks a structured-output model to fix the plan.
#[derive(Clone)]
pub struct LlmRepairer {
    client: Arc<dyn StructuredLlm>,
}

impl LlmRepairer {
    pub fn new(client: Arc<dyn StructuredLlm>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Repairer for LlmRepairer {
    fn mode(&self) -> Mode {
        Mode::Llm
    }

    async fn repair(
        &self,
        plan: &Plan,
        issues: &[ValidationIssue],
        allowed: &AllowedList<'_>,
        profile: &UserProfile,
    ) -> StageResult<Plan> {
        let request = StructuredRequest {
            task: LlmTask::Repair,
            schema_name: "plan_draft".to_owned(),
            schema: PlanDraft::json_schema(),
            instructions: INSTRUCTIONS.to_owned(),
            context: serde_json::json!({
                "profile": profile,
                "plan": { "days": &plan.days },
                "issues": issues,
                "allowed_exercises": allowed.exercises(),
            }),
        };

        let meta = PlanMeta {
            mode: Mode::Llm,
            ..plan.meta.clone()
        };
        match self
            .client
            .complete_json(&request)
            .await
            .and_then(|value| plan_from_reply(value, meta, plan.days.len()))
        {
            Ok(repaired) => StageResult::Ok(repaired),
            Err(err) => err.into(),
        }
    }
}
