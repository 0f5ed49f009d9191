//! Completion client for the prediction prompts.
//!
//! Provides a `CompletionBackend` trait with one HTTP implementation that
//! speaks the OpenAI chat-completions wire format:
//! - **OpenAI**: `https://api.openai.com/v1`, strict `json_object` responses
//! - **OpenRouter**: selected for `sk-or-` keys, plus attribution headers
//!
//! Every call is a single attempt. Callers decide what to do on failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::LlmConfig;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

// ============================================================================
// CompletionBackend trait
// ============================================================================

/// One system + user prompt pair, answered with a JSON object.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run the prompt and return the parsed JSON object from the reply.
    async fn complete_json(&self, request: &CompletionRequest) -> Result<Value, CompletionError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Upstream call failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Upstream call timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Missing API key")]
    MissingApiKey,
}

impl CompletionError {
    /// Network, timeout and non-2xx failures, as opposed to unusable content.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            CompletionError::Upstream(_) | CompletionError::Timeout(_) | CompletionError::Api { .. }
        )
    }
}

// ============================================================================
// Provider resolution
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    OpenRouter,
}

impl Provider {
    pub fn from_api_key(api_key: &str) -> Self {
        if api_key.trim().starts_with("sk-or-") {
            Provider::OpenRouter
        } else {
            Provider::OpenAi
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => OPENAI_BASE_URL,
            Provider::OpenRouter => OPENROUTER_BASE_URL,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o-mini",
            Provider::OpenRouter => "openai/gpt-4o",
        }
    }
}

/// Resolved client settings.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_key: String,
    pub provider: Provider,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub site_url: Option<String>,
    pub site_title: Option<String>,
}

impl CompletionConfig {
    /// Build from the `[llm]` section, taking the key from the argument or
    /// `OPENAI_API_KEY`.
    pub fn new(api_key: Option<String>, llm: &LlmConfig) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_default()
            .trim()
            .to_string();
        let provider = Provider::from_api_key(&api_key);

        Self {
            base_url: llm
                .base_url
                .clone()
                .unwrap_or_else(|| provider.default_base_url().to_string()),
            model: llm
                .model
                .clone()
                .unwrap_or_else(|| provider.default_model().to_string()),
            timeout: Duration::from_secs(llm.timeout_seconds),
            site_url: llm.site_url.clone().filter(|s| !s.trim().is_empty()),
            site_title: llm.site_title.clone().filter(|s| !s.trim().is_empty()),
            provider,
            api_key,
        }
    }
}

// ============================================================================
// Wire structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// OpenAiCompletionClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct OpenAiCompletionClient {
    client: Client,
    config: CompletionConfig,
}

impl OpenAiCompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        if config.api_key.is_empty() {
            return Err(CompletionError::MissingApiKey);
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, config })
    }

    /// Create a client against a custom base URL (for testing / local gateways)
    pub fn with_base_url(
        mut config: CompletionConfig,
        base_url: String,
    ) -> Result<Self, CompletionError> {
        config.base_url = base_url;
        Self::new(config)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn send(&self, request: &CompletionRequest) -> Result<Value, CompletionError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            response_format: match self.config.provider {
                Provider::OpenAi => Some(ResponseFormat {
                    kind: "json_object",
                }),
                Provider::OpenRouter => None,
            },
        };

        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if let Some(site_url) = &self.config.site_url {
            builder = builder.header("HTTP-Referer", site_url);
        }
        if let Some(site_title) = &self.config.site_title {
            builder = builder.header("X-Title", site_title);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout(self.config.timeout)
            } else {
                CompletionError::Upstream(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);

            tracing::error!(code = status.as_u16(), message = %message, "Completion API error");

            return Err(CompletionError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        let chat: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| CompletionError::Malformed(format!("response envelope: {}", e)))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionError::Malformed("missing choices[0].message.content".into()))?;

        parse_json_content(&content)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompletionClient {
    async fn complete_json(&self, request: &CompletionRequest) -> Result<Value, CompletionError> {
        tracing::debug!(
            model = %self.config.model,
            temperature = request.temperature,
            "Requesting completion"
        );
        self.send(request).await
    }

    fn name(&self) -> &str {
        match self.config.provider {
            Provider::OpenAi => "openai",
            Provider::OpenRouter => "openrouter",
        }
    }
}

/// Parse message content as a JSON object, unwrapping a ```json fence if present.
pub fn parse_json_content(content: &str) -> Result<Value, CompletionError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let value: Value = serde_json::from_str(unfenced)
        .map_err(|e| CompletionError::Malformed(format!("content is not JSON: {}", e)))?;

    if !value.is_object() {
        return Err(CompletionError::Malformed(
            "content is not a JSON object".to_string(),
        ));
    }

    Ok(value)
}

// ============================================================================
// TESTS
// ============================================================================
