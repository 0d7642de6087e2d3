use std::sync::Arc;

use async_trait::async_trait;

use super::Synthesizer;
use crate::allowed::AllowedList;
use crate::llm::{LlmError, LlmTask, StageResult, StructuredLlm, StructuredRequest};
use crate::model::{Mode, Plan, PlanDraft, PlanMeta, UserProfile};

const INSTRUCTIONS: &str = "\
You are a strength coach. Build a weekly training plan as JSON matching the \
provided schema. Use exactly `profile.days_per_week` days. Each day may hold at \
most `profile.max_exercises_per_day` blocks. Only use ids from \
`allowed_exercises` and never repeat an exercise within a day. Cover every \
muscle in `profile.emphasis` at least once during the week.";

/// [`Synthesizer`] that asks a structured-output model for the plan.
#[derive(Clone)]
pub struct LlmSynthesizer {
    client: Arc<dyn StructuredLlm>,
}

impl LlmSynthesizer {
    pub fn new(client: Arc<dyn StructuredLlm>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Synthesizer for LlmSynthesizer {
    fn mode(&self) -> Mode {
        Mode::Llm
    }

    async fn generate(
        &self,
        allowed: &AllowedList<'_>,
        profile: &UserProfile,
        seed: u64,
    ) -> StageResult<Plan> {
        let request = StructuredRequest {
            task: LlmTask::Synthesize,
            schema_name: "plan_draft".to_owned(),
            schema: PlanDraft::json_schema(),
            instructions: INSTRUCTIONS.to_owned(),
            context: serde_json::json!({
                "profile": profile,
                "allowed_exercises": allowed.exercises(),
            }),
        };

        let meta = PlanMeta {
            seed,
            mode: Mode::Llm,
            attempt_count: 0,
        };
        match self
            .client
            .complete_json(&request)
            .await
            .and_then(|value| plan_from_reply(value, meta, profile.days_per_week()))
        {
            Ok(plan) => StageResult::Ok(plan),
            Err(err) => err.into(),
        }
    }
}

/// Turn a model reply into a plan with exactly `days` days.
pub(crate) fn plan_from_reply(
    value: serde_json::Value,
    meta: PlanMeta,
    days: usize,
) -> Result<Plan, LlmError> {
    let draft: PlanDraft =
        serde_json::from_value(value).map_err(|e| LlmError::SchemaViolation(e.to_string()))?;
    draft
        .into_plan_with_days(meta, days)
        .map_err(|e| LlmError::SchemaViolation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::allowed::filter;
    use crate::catalog::Catalog;
    use crate::model::Equipment;

    struct Canned {
        reply: Result<serde_json::Value, LlmError>,
        seen: Mutex<Option<StructuredRequest>>,
    }

    #[async_trait]
    impl StructuredLlm for Canned {
        fn model(&self) -> &str {
            "canned"
        }

        async fn complete_json(
            &self,
            request: &StructuredRequest,
        ) -> Result<serde_json::Value, LlmError> {
            *self.seen.lock().unwrap() = Some(request.clone());
            self.reply.clone()
        }
    }

    fn synth(reply: Result<serde_json::Value, LlmError>) -> (LlmSynthesizer, Arc<Canned>) {
        let canned = Arc::new(Canned {
            reply,
            seen: Mutex::new(None),
        });
        (LlmSynthesizer::new(canned.clone()), canned)
    }

    fn profile(days: u8) -> UserProfile {
        UserProfile::builder(days, 3)
            .equipment([Equipment::Bodyweight])
            .build()
            .unwrap()
    }

    fn day(label: &str, id: &str) -> serde_json::Value {
        serde_json::json!({
            "day_index": 0,
            "label": label,
            "blocks": [{
                "exercise_id": id,
                "set_scheme": {"sets": 3, "reps": 10, "rest_seconds": 60}
            }]
        })
    }

    #[tokio::test]
    async fn accepts_well_formed_draft() {
        let catalog = Catalog::builtin();
        let p = profile(2);
        let allowed = filter(&catalog, &p).unwrap();
        let (s, canned) = synth(Ok(serde_json::json!({
            "days": [day("A", "bw_push_up"), day("B", "bw_pull_up")]
        })));

        let StageResult::Ok(plan) = s.generate(&allowed, &p, 4).await else {
            panic!("expected a plan");
        };
        assert_eq!(plan.meta.mode, Mode::Llm);
        assert_eq!(plan.meta.seed, 4);
        assert_eq!(plan.days[1].day_index, 1);

        let request = canned.seen.lock().unwrap().clone().unwrap();
        assert_eq!(request.task, LlmTask::Synthesize);
        assert_eq!(request.context["profile"]["days_per_week"], 2);
        assert_eq!(
            request.context["allowed_exercises"].as_array().unwrap().len(),
            allowed.len()
        );
    }

    #[tokio::test]
    async fn wrong_day_count_is_retriable() {
        let catalog = Catalog::builtin();
        let p = profile(3);
        let allowed = filter(&catalog, &p).unwrap();
        let (s, _) = synth(Ok(serde_json::json!({"days": [day("A", "bw_push_up")]})));
        assert!(matches!(
            s.generate(&allowed, &p, 1).await,
            StageResult::Retriable(_)
        ));
    }

    #[tokio::test]
    async fn garbage_is_retriable_and_auth_is_fatal() {
        let catalog = Catalog::builtin();
        let p = profile(1);
        let allowed = filter(&catalog, &p).unwrap();

        let (s, _) = synth(Ok(serde_json::json!({"plan": "nope"})));
        assert!(matches!(
            s.generate(&allowed, &p, 1).await,
            StageResult::Retriable(_)
        ));

        let (s, _) = synth(Err(LlmError::Auth("bad key".into())));
        assert!(matches!(
            s.generate(&allowed, &p, 1).await,
            StageResult::Fatal(_)
        ));
    }
}
