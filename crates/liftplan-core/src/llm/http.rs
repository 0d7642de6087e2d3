//! OpenAI-compatible `/chat/completions` client with JSON-schema output.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{LlmError, StructuredLlm, StructuredRequest};

/// Groq's OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.1-70b-versatile";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for [`ChatCompletionsClient`].
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl LlmSettings {
    /// Settings with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_owned(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP client for chat-completions style providers.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    settings: LlmSettings,
    client: reqwest::Client,
}

impl ChatCompletionsClient {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn request_body(&self, request: &StructuredRequest) -> serde_json::Value {
        serde_json::json!({
            "model": &self.settings.model,
            "temperature": self.settings.temperature,
            "messages": [
                {"role": "system", "content": &request.instructions},
                {"role": "user", "content": request.context.to_string()}
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": &request.schema_name,
                    "schema": &request.schema,
                    "strict": false
                }
            }
        })
    }
}

#[async_trait]
impl StructuredLlm for ChatCompletionsClient {
    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn complete_json(
        &self,
        request: &StructuredRequest,
    ) -> Result<serde_json::Value, LlmError> {
        tracing::debug!(
            model = %self.settings.model,
            task = ?request.task,
            "sending structured-output request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;

        if let Some(err) = classify_status(status, &body, &self.settings.model) {
            return Err(err);
        }
        parse_content(&body)
    }
}

fn transport_error(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Transport(err.to_string())
    }
}

/// Map a non-success HTTP status to a typed error. `None` for 2xx.
pub(crate) fn classify_status(status: u16, body: &str, model: &str) -> Option<LlmError> {
    let message = error_message(body);
    match status {
        200..=299 => None,
        401 | 403 => Some(LlmError::Auth(message)),
        404 => Some(LlmError::InvalidModel {
            model: model.to_owned(),
            message,
        }),
        400 if message.to_lowercase().contains("model") => Some(LlmError::InvalidModel {
            model: model.to_owned(),
            message,
        }),
        429 => Some(LlmError::RateLimited),
        // 5xx and anything unexpected
        _ => Some(LlmError::Server { status, message }),
    }
}

/// Provider error bodies look like `{"error": {"message": "..."}}`.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: ErrorBody,
    }

    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => body.chars().take(200).collect(),
    }
}

/// Extract and parse the JSON payload of the first choice.
pub(crate) fn parse_content(body: &str) -> Result<serde_json::Value, LlmError> {
    #[derive(Deserialize)]
    struct Message {
        content: Option<String>,
    }
    #[derive(Deserialize)]
    struct Choice {
        message: Message,
    }
    #[derive(Deserialize)]
    struct ApiResponse {
        choices: Vec<Choice>,
    }

    let response: ApiResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::SchemaViolation(format!("unreadable response envelope: {e}")))?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| LlmError::SchemaViolation("empty response content".into()))?;

    serde_json::from_str(&content)
        .map_err(|e| LlmError::SchemaViolation(format!("content is not JSON: {e}")))
}
