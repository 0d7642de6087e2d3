//! Plan synthesis strategies.
//!
//! A [`Synthesizer`] turns an allowed list and a profile into a candidate
//! [`Plan`]. The result is well formed but not guaranteed to validate; the
//! pipeline runs the validator and repairer afterwards.

pub mod llm;
pub mod local;

use async_trait::async_trait;

use crate::allowed::AllowedList;
use crate::llm::StageResult;
use crate::model::{Mode, Plan, UserProfile};

pub use llm::LlmSynthesizer;
pub use local::{DayFocus, LocalSynthesizer, generate_local, rotation};

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Backend this strategy reports in plan metadata.
    fn mode(&self) -> Mode;

    async fn generate(
        &self,
        allowed: &AllowedList<'_>,
        profile: &UserProfile,
        seed: u64,
    ) -> StageResult<Plan>;
}

// Compile-time assertion: Synthesizer must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Synthesizer) {}
};
