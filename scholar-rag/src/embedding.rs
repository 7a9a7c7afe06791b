//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (a local model process,
/// a remote API, or the built-in [`HashEmbeddingProvider`](crate::HashEmbeddingProvider))
/// behind a unified async interface. Output must be deterministic for the
/// same input and model, and every vector must have [`dimensions`](Self::dimensions)
/// elements.
///
/// The default [`embed_batch`](EmbeddingProvider::embed_batch) implementation
/// calls [`embed`](EmbeddingProvider::embed) sequentially; backends that
/// support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use scholar_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The output has one vector per input, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Short provider name used in logs and error messages.
    fn name(&self) -> &str;
}

/// Check a backend's batch response against the request it answered.
///
/// Remote backends can silently drop inputs or return vectors of another
/// size; both are reported as [`RagError::EmbeddingError`].
pub fn check_batch(
    provider: &str,
    expected_len: usize,
    dimensions: usize,
    embeddings: &[Vec<f32>],
) -> Result<()> {
    if embeddings.len() != expected_len {
        return Err(RagError::EmbeddingError {
            provider: provider.to_string(),
            message: format!("expected {expected_len} embeddings, got {}", embeddings.len()),
        });
    }
    if let Some(bad) = embeddings.iter().find(|e| e.len() != dimensions) {
        return Err(RagError::EmbeddingError {
            provider: provider.to_string(),
            message: format!("expected {dimensions}-dimensional embeddings, got {}", bad.len()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_batch_flags_length_and_dimension() {
        assert!(check_batch("t", 2, 3, &[vec![0.0; 3], vec![0.0; 3]]).is_ok());
        assert!(matches!(
            check_batch("t", 2, 3, &[vec![0.0; 3]]),
            Err(RagError::EmbeddingError { .. })
        ));
        assert!(matches!(
            check_batch("t", 1, 3, &[vec![0.0; 4]]),
            Err(RagError::EmbeddingError { .. })
        ));
    }
}
