use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Core trait for text-generation backends
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate completion for a given prompt
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Plain text completion capped at `max_tokens` output tokens.
    async fn complete(&self, prompt: &str, max_tokens: usize) -> Result<String, LlmError> {
        let request = LlmRequest::new(prompt).with_max_tokens(max_tokens);
        let response = self.generate(request).await?;
        debug!(
            "{} answered: {} prompt + {} completion tokens",
            response.model, response.usage.prompt_tokens, response.usage.completion_tokens
        );
        Ok(response.content)
    }
}

/// Request structure for LLM generation
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: None,
            temperature: None,
            timeout_seconds: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Failure of a single generation call. Nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM authentication failed ({status}): {body}")]
    Auth { status: u16, body: String },
    #[error("LLM rate limited ({status}): {body}")]
    RateLimited { status: u16, body: String },
    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("LLM HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed LLM response: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        let code = status.as_u16();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Auth { status: code, body },
            StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited { status: code, body },
            _ => LlmError::Api { status: code, body },
        }
    }

    /// Short machine-readable cause, used by the HTTP adapter.
    pub fn cause(&self) -> &'static str {
        match self {
            LlmError::Auth { .. } => "auth",
            LlmError::RateLimited { .. } => "quota",
            LlmError::Api { .. } => "api",
            LlmError::Network(_) => "network",
            LlmError::Timeout(_) => "timeout",
            LlmError::MalformedResponse(_) => "malformed_response",
        }
    }
}

pub mod anthropic;
pub mod remote;
