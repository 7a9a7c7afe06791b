//! Local embedding provider backed by an Ollama server.
//!
//! This module is only available when the `ollama` feature is enabled. The
//! model runs in a separate local process; nothing leaves the machine.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::{EmbeddingProvider, check_batch};
use crate::error::{RagError, Result};

/// The default Ollama address.
const DEFAULT_HOST: &str = "http://localhost:11434";

/// Sentence-transformers MiniLM, 384 dimensions.
const DEFAULT_MODEL: &str = "all-minilm";
const DEFAULT_DIMENSIONS: usize = 384;

/// Local models can be slow to load on first use.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const PROVIDER: &str = "Ollama";

/// An [`EmbeddingProvider`] that calls Ollama's `/api/embed` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use scholar_rag::ollama::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::from_env()?
///     .with_model("nomic-embed-text", 768);
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    host: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbeddingProvider {
    /// Create a provider talking to `host` with the default model.
    ///
    /// `host` may omit the scheme (`127.0.0.1:11434`), as `OLLAMA_HOST`
    /// commonly does; `http://` is assumed.
    pub fn new(host: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| embedding_error(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            host: base_url(&host.into()),
            model: DEFAULT_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
        })
    }

    /// Create a provider using `OLLAMA_HOST`, falling back to localhost.
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        Self::new(host)
    }

    /// Use another embedding model. Its output size must be given because
    /// Ollama does not report it ahead of the first request.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }
}

fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") { host.to_string() } else { format!("http://{host}") }
}

fn embedding_error(message: impl Into<String>) -> RagError {
    RagError::EmbeddingError { provider: PROVIDER.into(), message: message.into() }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| embedding_error("server returned no embeddings"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, model = %self.model, batch_size = texts.len(), "embedding");

        let body = EmbedRequest { model: &self.model, input: texts.to_vec() };
        let response = self
            .client
            .post(format!("{}/api/embed", self.host))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, timeout = e.is_timeout(), "request failed");
                embedding_error(format!("request to {} failed: {e}", self.host))
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(provider = PROVIDER, %status, "API error");
            return Err(embedding_error(format!("server returned {status}: {detail}")));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| embedding_error(format!("failed to parse response: {e}")))?;

        check_batch(PROVIDER, texts.len(), self.dimensions, &parsed.embeddings)?;
        Ok(parsed.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
