//! Anthropic Messages API generation provider.
//!
//! This module is only available when the `anthropic` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;

/// The default Anthropic API base URL.
const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";

/// Required `anthropic-version` header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// The default model.
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const DEFAULT_MAX_TOKENS: u32 = 1024;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const PROVIDER: &str = "Anthropic";

/// A [`GenerationProvider`] backed by the Anthropic Messages API.
///
/// # Configuration
///
/// - `model` – defaults to `claude-sonnet-4-20250514`.
/// - `max_tokens` – defaults to 1024.
/// - `timeout` – defaults to 60 seconds; a timed-out call fails with
///   [`RagError::GenerationError`] and is not retried.
/// - `api_key` – from the constructor or the `ANTHROPIC_API_KEY` environment variable.
///
/// # Example
///
/// ```rust,ignore
/// use scholar_rag::anthropic::AnthropicGenerationProvider;
///
/// let provider = AnthropicGenerationProvider::from_env()?.with_max_tokens(512);
/// let answer = provider.generate("Hello").await?;
/// ```
pub struct AnthropicGenerationProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl AnthropicGenerationProvider {
    /// Create a new provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(generation_error("API key must not be empty"));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: ANTHROPIC_API_BASE.into(),
            model: DEFAULT_MODEL.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Create a new provider using the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            generation_error("ANTHROPIC_API_KEY not set (add it to the environment or .env)")
        })?;
        Self::new(api_key)
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Point the provider at another Messages-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

fn generation_error(message: impl Into<String>) -> RagError {
    RagError::GenerationError { provider: PROVIDER.into(), message: message.into() }
}

// ── Messages API request/response types ────────────────────────────

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Join the text blocks of a response. A response without text is an error.
fn response_text(response: MessagesResponse) -> Result<String> {
    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();

    if text.trim().is_empty() {
        return Err(generation_error(format!(
            "response contained no text (stop_reason: {})",
            response.stop_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(text)
}

#[async_trait]
impl GenerationProvider for AnthropicGenerationProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, prompt_len = prompt.len(), "generating");

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: [Message { role: "user", content: prompt }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .timeout(self.timeout)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, timeout = e.is_timeout(), "request failed");
                if e.is_timeout() {
                    generation_error(format!("request timed out after {:?}", self.timeout))
                } else {
                    generation_error(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(provider = PROVIDER, %status, "API error");
            return Err(generation_error(format!("API returned {status}: {detail}")));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            generation_error(format!("failed to parse response: {e}"))
        })?;

        response_text(parsed)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_rejected() {
        assert!(matches!(
            AnthropicGenerationProvider::new(""),
            Err(RagError::GenerationError { .. })
        ));
    }

    #[test]
    fn request_shape() {
        let body = MessagesRequest {
            model: DEFAULT_MODEL,
            max_tokens: 10,
            messages: [Message { role: "user", content: "hi" }],
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "model": "claude-sonnet-4-20250514",
                "max_tokens": 10,
                "messages": [{ "role": "user", "content": "hi" }]
            })
        );
    }

    #[test]
    fn joins_text_blocks() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"Hello, "},{"type":"text","text":"world"}],
                "stop_reason":"end_turn"}"#,
        )
        .unwrap();
        assert_eq!(response_text(response).unwrap(), "Hello, world");
    }

    #[test]
    fn empty_response_is_an_error() {
        let response: MessagesResponse =
            serde_json::from_str(r#"{"content":[],"stop_reason":"max_tokens"}"#).unwrap();
        let err = response_text(response).unwrap_err();
        assert!(err.to_string().contains("max_tokens"));
    }
}
