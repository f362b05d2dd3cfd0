use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{LlmError, LlmProvider, LlmRequest, LlmResponse, UsageMetadata};

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Provider for the Anthropic Messages API
pub struct AnthropicProvider {
    api_url: String,
    api_key: String,
    model: String,
    default_timeout: Duration,
    default_max_tokens: usize,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            default_timeout: Duration::from_secs(60),
            default_max_tokens: 1000,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.default_timeout = Duration::from_secs(timeout_secs);
        self
    }

    async fn send(&self, req_body: &MessagesRequest) -> Result<MessagesResponse, LlmError> {
        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(req_body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::from_status(status, body));
        }
        serde_json::from_str(&body).map_err(|e| LlmError::MalformedResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let timeout = request
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let req_body = MessagesRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens.unwrap_or(self.default_max_tokens),
            messages: vec![Message {
                role: "user".to_string(),
                content: request.prompt,
            }],
            temperature: request.temperature,
        };

        let resp_body = tokio::time::timeout(timeout, self.send(&req_body))
            .await
            .map_err(|_| LlmError::Timeout(timeout))??;

        // The first text block carries the answer
        let content = resp_body
            .content
            .iter()
            .find_map(|block| block.text.clone())
            .ok_or_else(|| LlmError::MalformedResponse("response has no text content".to_string()))?;

        let usage = resp_body
            .usage
            .map(|u| UsageMetadata {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            usage,
            model: resp_body.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: usize,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: Option<String>,
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: usize,
    #[serde(default)]
    output_tokens: usize,
}
