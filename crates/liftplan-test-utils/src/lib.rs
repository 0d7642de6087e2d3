//! Shared test utilities for liftplan integration tests.
//!
//! Provides fixture catalogs and profiles, plan-building helpers, and
//! [`ScriptedLlm`], a [`StructuredLlm`] that replays canned replies so LLM
//! paths can be exercised without a network.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use liftplan_core::catalog::Catalog;
use liftplan_core::llm::{LlmError, LlmTask, StructuredLlm, StructuredRequest};
use liftplan_core::model::{
    DayPlan, Equipment, ExerciseBlock, Mode, Plan, PlanMeta, Reps, SetScheme, UserProfile,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A small mixed catalog: bodyweight, dumbbell, and barbell movements.
pub const MIXED_CATALOG_JSON: &str = r#"[
  {"id": "push_up", "name": "Push-up", "primary_muscles": ["chest", "triceps"],
   "function": "horizontal_push", "equipment": ["bodyweight"], "type": "compound"},
  {"id": "pike_push_up", "name": "Pike Push-up", "primary_muscles": ["front_delts", "triceps"],
   "function": "vertical_push", "equipment": ["bodyweight"], "type": "compound"},
  {"id": "pull_up", "name": "Pull-up", "primary_muscles": ["lats", "biceps"],
   "function": "vertical_pull", "equipment": ["bodyweight"], "type": "compound"},
  {"id": "inverted_row", "name": "Inverted Row", "primary_muscles": ["upper_back", "lats"],
   "function": "row", "equipment": ["bodyweight"], "type": "compound"},
  {"id": "air_squat", "name": "Air Squat", "primary_muscles": ["quads", "glutes"],
   "function": "squat", "equipment": ["bodyweight"], "type": "compound"},
  {"id": "glute_bridge", "name": "Glute Bridge", "primary_muscles": ["glutes", "hamstrings"],
   "function": "hinge", "equipment": ["bodyweight"], "type": "isolation"},
  {"id": "plank", "name": "Plank", "primary_muscles": ["abs"],
   "function": "anti_extension", "equipment": ["bodyweight"], "type": "isolation"},
  {"id": "db_curl", "name": "Dumbbell Curl", "primary_muscles": ["biceps"],
   "function": "elbow_flexion", "equipment": ["dumbbell"], "type": "isolation"},
  {"id": "db_press", "name": "Dumbbell Press", "primary_muscles": ["chest", "front_delts"],
   "function": "horizontal_push", "equipment": ["dumbbell"], "type": "compound"},
  {"id": "bb_deadlift", "name": "Deadlift", "primary_muscles": ["hamstrings", "glutes", "lower_back"],
   "function": "hinge", "equipment": ["barbell"], "type": "compound"}
]"#;

/// [`MIXED_CATALOG_JSON`] parsed.
pub fn mixed_catalog() -> Catalog {
    Catalog::from_json_str(MIXED_CATALOG_JSON).expect("fixture catalog is valid")
}

/// A bodyweight-only profile.
pub fn bodyweight_profile(days: u8, max_per_day: u8) -> UserProfile {
    UserProfile::builder(days, max_per_day)
        .equipment([Equipment::Bodyweight])
        .build()
        .expect("fixture profile is valid")
}

/// A profile that may use every kind of equipment.
pub fn full_gym_profile(days: u8, max_per_day: u8) -> UserProfile {
    UserProfile::builder(days, max_per_day)
        .equipment(Equipment::ALL)
        .build()
        .expect("fixture profile is valid")
}

/// The set scheme used by [`plan_of`].
pub fn fixture_scheme() -> SetScheme {
    SetScheme {
        sets: 3,
        reps: Reps::Fixed(10),
        rest_seconds: 90,
    }
}

/// Build a plan from exercise ids, one slice per day.
pub fn plan_of(days: &[&[&str]]) -> Plan {
    Plan {
        days: days
            .iter()
            .enumerate()
            .map(|(i, ids)| DayPlan {
                day_index: i,
                label: format!("Day {}", i + 1),
                blocks: ids
                    .iter()
                    .map(|id| ExerciseBlock {
                        exercise_id: (*id).into(),
                        set_scheme: fixture_scheme(),
                    })
                    .collect(),
            })
            .collect(),
        meta: PlanMeta {
            seed: 0,
            mode: Mode::Local,
            attempt_count: 0,
        },
    }
}

/// A model reply (`{"days": [...]}`) for the given exercise ids.
pub fn draft_json(days: &[&[&str]]) -> serde_json::Value {
    let plan = plan_of(days);
    serde_json::json!({ "days": plan.days })
}

// ---------------------------------------------------------------------------
// Scripted LLM
// ---------------------------------------------------------------------------

/// A [`StructuredLlm`] that replays a fixed script of replies.
///
/// Replies are consumed in order; once the script is exhausted every call
/// returns the fallback reply (a schema violation unless overridden).
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<serde_json::Value, LlmError>>>,
    fallback: Result<serde_json::Value, LlmError>,
    tasks: Mutex<Vec<LlmTask>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    hang: bool,
}

impl ScriptedLlm {
    pub fn new(script: impl IntoIterator<Item = Result<serde_json::Value, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: Err(LlmError::SchemaViolation("script exhausted".into())),
            tasks: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
            hang: false,
        }
    }

    /// A client that answers every call with `reply`.
    pub fn always(reply: Result<serde_json::Value, LlmError>) -> Self {
        Self::new([]).fallback(reply)
    }

    /// A client whose calls never complete.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::new([])
        }
    }

    pub fn fallback(mut self, reply: Result<serde_json::Value, LlmError>) -> Self {
        self.fallback = reply;
        self
    }

    /// Sleep before answering each call.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Task of every call received, in order.
    pub fn tasks(&self) -> Vec<LlmTask> {
        self.tasks.lock().expect("tasks lock poisoned").clone()
    }
}

#[async_trait]
impl StructuredLlm for ScriptedLlm {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete_json(
        &self,
        request: &StructuredRequest,
    ) -> Result<serde_json::Value, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tasks
            .lock()
            .expect("tasks lock poisoned")
            .push(request.task);

        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().expect("script lock poisoned").pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
