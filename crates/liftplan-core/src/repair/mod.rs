//! Plan repair strategies.
//!
//! A [`Repairer`] receives a plan and the issues the validator found, and
//! returns a corrected plan. Repairs never change days that have no issues.

pub mod llm;
pub mod local;

use async_trait::async_trait;

use crate::allowed::AllowedList;
use crate::llm::StageResult;
use crate::model::{Mode, Plan, UserProfile, ValidationIssue};

pub use llm::LlmRepairer;
pub use local::{LocalRepairer, ReplaceError, repair_local, replace_exercise};

#[async_trait]
pub trait Repairer: Send + Sync {
    fn mode(&self) -> Mode;

    async fn repair(
        &self,
        plan: &Plan,
        issues: &[ValidationIssue],
        allowed: &AllowedList<'_>,
        profile: &UserProfile,
    ) -> StageResult<Plan>;
}

// Compile-time assertion: Repairer must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Repairer) {}
};
