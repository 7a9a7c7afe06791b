//! Vector store trait for storing and searching vector embeddings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, SearchResult};
use crate::error::Result;

/// Entry counts for one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Declared vector dimensionality.
    pub dimensions: usize,
    /// Number of stored chunks.
    pub chunks: usize,
    /// Number of distinct source documents.
    pub documents: usize,
}

/// A storage backend for vector embeddings with similarity search.
///
/// Implementations manage named collections of [`Chunk`]s keyed by chunk id
/// and support upserting, deleting, and searching by vector similarity.
/// A batch passed to [`upsert`](Self::upsert) or
/// [`replace_document`](Self::replace_document) must become visible to
/// readers all at once.
///
/// # Example
///
/// ```rust,ignore
/// use scholar_rag::{VectorStore, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", 384).await?;
/// store.upsert("docs", &chunks).await?;
/// let results = store.search("docs", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists with the same
    /// dimensionality; [`DimensionMismatch`](crate::RagError::DimensionMismatch)
    /// if it exists with another.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a named collection and all its data.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert or replace chunks by id. Chunks must have embeddings set.
    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Delete chunks by their IDs from a collection.
    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()>;

    /// Replace every chunk of `document_id` with `chunks`.
    ///
    /// Chunks of the document that are absent from `chunks` are removed;
    /// an empty `chunks` removes the document. Readers see either the old
    /// chunks or the new ones, never a mix.
    async fn replace_document(
        &self,
        collection: &str,
        document_id: &str,
        chunks: &[Chunk],
    ) -> Result<()>;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// Returns results ordered by descending similarity score. An empty
    /// collection yields an empty `Vec`.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Entry counts for a collection.
    async fn stats(&self, collection: &str) -> Result<CollectionStats>;
}
