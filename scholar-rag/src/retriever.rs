//! Query-time retrieval: embed → search → rerank → threshold.
//!
//! [`Retriever`] holds no state of its own. It is the seam where retrieval
//! policy lives so that the [`VectorStore`] stays a plain index.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// A reranker that re-scores and reorders search results.
///
/// Implementations can use cross-encoder models, LLM-based scoring, or
/// other strategies to improve precision beyond initial vector similarity.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank search results given the original query.
    ///
    /// Returns results in a new order with potentially updated scores.
    async fn rerank(&self, query: &str, results: Vec<SearchResult>) -> Result<Vec<SearchResult>>;

    /// Name used in errors and logs.
    fn name(&self) -> &str;
}

/// A reranker that returns results unchanged. The [`Retriever`] default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReranker;

#[async_trait]
impl Reranker for NoOpReranker {
    async fn rerank(&self, _query: &str, results: Vec<SearchResult>) -> Result<Vec<SearchResult>> {
        Ok(results)
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Turns a query string into at most `top_k` scored chunks.
///
/// # Example
///
/// ```rust,ignore
/// let retriever = Retriever::new(embedder, store).with_similarity_threshold(0.2);
/// let results = retriever.retrieve("docs", "what reduces cognitive load?", 3).await?;
/// ```
#[derive(Clone)]
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    reranker: Arc<dyn Reranker>,
    similarity_threshold: f32,
}

impl Retriever {
    /// Create a retriever with the [`NoOpReranker`] and no score threshold.
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            embedding_provider,
            vector_store,
            reranker: Arc::new(NoOpReranker),
            similarity_threshold: f32::MIN,
        }
    }

    /// Rerank search results before thresholding.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    /// Drop results scoring below `threshold`.
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Retrieve up to `top_k` chunks for `query`, best first.
    ///
    /// Errors keep their original kind: a failing backend surfaces as
    /// [`EmbeddingError`](crate::RagError::EmbeddingError), a wrong-sized
    /// query vector as [`DimensionMismatch`](crate::RagError::DimensionMismatch).
    /// Any reranker failure surfaces as [`RerankerError`](RagError::RerankerError).
    pub async fn retrieve(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let query_embedding = self.embedding_provider.embed(query).await.inspect_err(|e| {
            error!(provider = self.embedding_provider.name(), error = %e, "query embedding failed");
        })?;

        let results =
            self.vector_store.search(collection, &query_embedding, top_k).await.inspect_err(
                |e| error!(collection, error = %e, "vector store search failed"),
            )?;

        let reranker = self.reranker.name();
        let mut results = self.reranker.rerank(query, results).await.map_err(|e| {
            error!(reranker, error = %e, "reranking failed");
            match e {
                RagError::RerankerError { .. } => e,
                other => RagError::RerankerError {
                    reranker: reranker.to_string(),
                    message: other.to_string(),
                },
            }
        })?;

        let threshold = self.similarity_threshold;
        results.retain(|r| r.score >= threshold);
        results.truncate(top_k);

        debug!(collection, top_k, result_count = results.len(), "retrieval completed");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RagConfig;
    use crate::document::Chunk;
    use crate::inmemory::InMemoryVectorStore;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn dimensions(&self) -> usize {
            self.0.len()
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(RagError::EmbeddingError { provider: "down".into(), message: "unreachable".into() })
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "down"
        }
    }

    /// Reverses the order, promoting the weakest hit.
    struct Reverse;

    #[async_trait]
    impl Reranker for Reverse {
        async fn rerank(&self, _: &str, mut hits: Vec<SearchResult>) -> Result<Vec<SearchResult>> {
            hits.reverse();
            Ok(hits)
        }

        fn name(&self) -> &str {
            "reverse"
        }
    }

    /// Fails the way a model-backed reranker would when its backend is down.
    struct Unavailable;

    #[async_trait]
    impl Reranker for Unavailable {
        async fn rerank(&self, _: &str, _: Vec<SearchResult>) -> Result<Vec<SearchResult>> {
            Err(RagError::GenerationError { provider: "judge".into(), message: "timed out".into() })
        }

        fn name(&self) -> &str {
            "llm-judge"
        }
    }

    async fn store() -> Arc<InMemoryVectorStore> {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", 2).await.unwrap();
        let chunk = |id: &str, embedding: Vec<f32>| Chunk {
            id: id.into(),
            text: id.into(),
            embedding,
            metadata: Default::default(),
            document_id: "d".into(),
            start_offset: 0,
            end_offset: id.len(),
        };
        store
            .upsert("c", &[chunk("near", vec![1.0, 0.1]), chunk("far", vec![0.0, 1.0])])
            .await
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn threshold_filters_low_scores() {
        let retriever = Retriever::new(Arc::new(FixedEmbedder(vec![1.0, 0.0])), store().await)
            .with_similarity_threshold(0.5);
        let results = retriever.retrieve("c", "q", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "near");
    }

    #[tokio::test]
    async fn reranker_applies_after_search() {
        let retriever = Retriever::new(Arc::new(FixedEmbedder(vec![1.0, 0.0])), store().await)
            .with_reranker(Arc::new(Reverse));
        let results = retriever.retrieve("c", "q", 2).await.unwrap();
        assert_eq!(results[0].chunk.id, "far");
    }

    #[tokio::test]
    async fn reranker_failure_is_a_reranker_error() {
        let retriever = Retriever::new(Arc::new(FixedEmbedder(vec![1.0, 0.0])), store().await)
            .with_reranker(Arc::new(Unavailable));
        let err = retriever.retrieve("c", "q", 2).await.unwrap_err();
        let RagError::RerankerError { reranker, message } = err else {
            panic!("expected a reranker error");
        };
        assert_eq!(reranker, "llm-judge");
        assert!(message.contains("timed out"));
    }

    #[tokio::test]
    async fn noop_reranker_keeps_search_order() {
        let hits = store().await.search("c", &[1.0, 0.0], 2).await.unwrap();
        let reranked = NoOpReranker.rerank("q", hits.clone()).await.unwrap();
        assert_eq!(reranked, hits);
    }

    #[tokio::test]
    async fn default_threshold_keeps_opposite_vectors() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", 7).await.unwrap();
        let query: Vec<f32> = vec![0.3, -1.7, 2.9, 0.01, -0.6, 4.2, 1.1];
        let opposite = Chunk {
            id: "opposite".into(),
            text: "opposite".into(),
            embedding: query.iter().map(|x| -x).collect(),
            metadata: Default::default(),
            document_id: "d".into(),
            start_offset: 0,
            end_offset: 8,
        };
        store.upsert("c", &[opposite]).await.unwrap();

        let retriever = Retriever::new(Arc::new(FixedEmbedder(query)), Arc::new(store))
            .with_similarity_threshold(RagConfig::default().similarity_threshold);
        let results = retriever.retrieve("c", "q", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].score >= -1.0);
    }

    #[tokio::test]
    async fn embedding_failure_keeps_its_kind() {
        let retriever = Retriever::new(Arc::new(FailingEmbedder), store().await);
        let err = retriever.retrieve("c", "q", 2).await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingError { .. }));
    }
}
