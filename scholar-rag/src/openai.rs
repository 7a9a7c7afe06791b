//! Remote embeddings through the OpenAI `/embeddings` endpoint.
//!
//! Only built with the `openai` feature. Any server speaking the same
//! protocol (vLLM, LiteLLM, Azure proxies) works through
//! [`OpenAIEmbeddingProvider::with_base_url`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::{EmbeddingProvider, check_batch};
use crate::error::{RagError, Result};

const PROVIDER: &str = "OpenAI";
const API_KEY_VAR: &str = "OPENAI_API_KEY";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// `text-embedding-3-small` and its native width.
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DIMENSIONS: usize = 1536;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// An [`EmbeddingProvider`] calling the OpenAI embeddings API.
///
/// ```rust,ignore
/// use scholar_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::from_env()?.with_dimensions(512);
/// let vectors = provider.embed_batch(&["first note", "second note"]).await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    /// Sent as `dimensions` so the API shortens its vectors; `None` keeps
    /// the model's native width.
    shortened_to: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Provider for `text-embedding-3-small` authenticated with `api_key`.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(embedding_error("API key is empty"));
        }
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| embedding_error(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            shortened_to: None,
        })
    }

    /// Provider authenticated from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        match std::env::var(API_KEY_VAR) {
            Ok(key) => Self::new(key),
            Err(_) => Err(embedding_error(format!("{API_KEY_VAR} is not set"))),
        }
    }

    /// Use another embedding model, e.g. `text-embedding-3-large`.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Send requests to an OpenAI-compatible server instead.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Ask the API for vectors shortened to `dims`. Also what
    /// [`dimensions`](EmbeddingProvider::dimensions) reports from then on.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.shortened_to = Some(dims);
        self
    }

    async fn call(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.shortened_to,
        };
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, timeout = e.is_timeout(), "request failed");
                embedding_error(format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            error!(provider = PROVIDER, %status, "API error");
            return Err(embedding_error(format!("API returned {status}: {}", api_message(raw))));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| embedding_error(format!("failed to parse response: {e}")))?;
        Ok(parsed.into_ordered())
    }
}

fn embedding_error(message: impl Into<String>) -> RagError {
    RagError::EmbeddingError { provider: PROVIDER.into(), message: message.into() }
}

/// The `error.message` field of an API error body, or the raw body.
fn api_message(raw: String) -> String {
    #[derive(Deserialize)]
    struct Body {
        error: Detail,
    }
    #[derive(Deserialize)]
    struct Detail {
        message: String,
    }

    match serde_json::from_str::<Body>(&raw) {
        Ok(body) => body.error.message,
        Err(_) => raw,
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<IndexedEmbedding>,
}

#[derive(Deserialize)]
struct IndexedEmbedding {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    /// Vectors in input order; the API tags each one with its input index.
    fn into_ordered(mut self) -> Vec<Vec<f32>> {
        self.data.sort_by_key(|d| d.index);
        self.data.into_iter().map(|d| d.embedding).collect()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors.pop().ok_or_else(|| embedding_error("API returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = PROVIDER, model = %self.model, batch_size = texts.len(), "embedding");

        let vectors = self.call(texts).await?;
        check_batch(PROVIDER, texts.len(), self.dimensions, &vectors)?;
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_api_key_rejected() {
        for key in ["", "   "] {
            assert!(matches!(
                OpenAIEmbeddingProvider::new(key),
                Err(RagError::EmbeddingError { .. })
            ));
        }
    }

    #[test]
    fn builder_overrides() {
        let provider = OpenAIEmbeddingProvider::new("sk-test")
            .unwrap()
            .with_model("text-embedding-3-large")
            .with_base_url("http://localhost:8080/v1/")
            .with_dimensions(256);
        assert_eq!(provider.model, "text-embedding-3-large");
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
        assert_eq!(provider.dimensions(), 256);
        assert_eq!(provider.shortened_to, Some(256));
    }

    #[test]
    fn request_omits_unset_dimensions() {
        let body = EmbeddingRequest { model: "m", input: &["a", "b"], dimensions: None };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "model": "m", "input": ["a", "b"] }));
    }

    #[test]
    fn response_is_reordered_by_index() {
        let json = r#"{"data":[
            {"index":1,"embedding":[0.0,1.0]},
            {"index":0,"embedding":[1.0,0.0]}
        ]}"#;
        let response: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.into_ordered(), vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn api_error_message_is_extracted() {
        let raw = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request"}}"#;
        assert_eq!(api_message(raw.to_string()), "Incorrect API key provided");
        assert_eq!(api_message("bad gateway".to_string()), "bad gateway");
    }
}
