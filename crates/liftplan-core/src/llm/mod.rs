//! Structured-output LLM client interface.
//!
//! The pipeline only needs one capability from a model: given a JSON Schema
//! and a context payload, return a JSON value that (ideally) conforms to the
//! schema. [`StructuredLlm`] captures that; [`ChatCompletionsClient`] is the
//! HTTP implementation for OpenAI-compatible endpoints.
//!
//! ```text
//! LlmSynthesizer / LlmRepairer / Assistant
//!     |
//!     v
//! StructuredLlm::complete_json(request) --> Result<Value, LlmError>
//!     |
//!     v
//! StageResult::{Ok, Retriable, Fatal}   (consumed by the pipeline loop)
//! ```

pub mod http;
pub mod retry;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use http::{ChatCompletionsClient, LlmSettings};
pub use retry::{RetryPolicy, StageOutcome, run_with_retry};

/// Which pipeline stage or auxiliary job issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmTask {
    Synthesize,
    Repair,
    Explain,
    Question,
    Replace,
}

/// A single structured-output request.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub task: LlmTask,
    /// Name attached to the schema in the request body.
    pub schema_name: String,
    pub schema: serde_json::Value,
    /// System instructions.
    pub instructions: String,
    /// Context payload serialized as the user message.
    pub context: serde_json::Value,
}

/// Typed failures from a structured-output call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited by provider")]
    RateLimited,

    #[error("provider error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid model {model:?}: {message}")]
    InvalidModel { model: String, message: String },

    #[error("response violates schema: {0}")]
    SchemaViolation(String),
}

impl LlmError {
    /// Whether retrying the same call may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::RateLimited
                | Self::Server { .. }
                | Self::Transport(_)
                | Self::SchemaViolation(_)
        )
    }
}

/// Outcome of one attempt at a pipeline stage.
///
/// Strategies never raise errors across the stage boundary; they report one
/// of these variants and the pipeline decides whether to retry or fall back.
#[derive(Debug, Clone, PartialEq)]
pub enum StageResult<T> {
    Ok(T),
    Retriable(String),
    Fatal(String),
}

impl<T> From<LlmError> for StageResult<T> {
    fn from(err: LlmError) -> Self {
        if err.is_retriable() {
            Self::Retriable(err.to_string())
        } else {
            Self::Fatal(err.to_string())
        }
    }
}

/// A model that can answer with schema-constrained JSON.
#[async_trait]
pub trait StructuredLlm: Send + Sync {
    /// Model identifier, for logs.
    fn model(&self) -> &str;

    async fn complete_json(&self, request: &StructuredRequest)
    -> Result<serde_json::Value, LlmError>;
}

// Compile-time assertion: StructuredLlm must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn StructuredLlm) {}
};
