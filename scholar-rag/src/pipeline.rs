//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] wires the two flows together: ingest
//! (load → chunk → embed → store) and query (retrieve → synthesize).
//!
//! # Example
//!
//! ```rust,ignore
//! use scholar_rag::{RagPipeline, RagConfig, InMemoryVectorStore, HashEmbeddingProvider};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::default()))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .generation_provider(Arc::new(my_llm))
//!     .build()?;
//!
//! pipeline.create_collection("docs").await?;
//! let report = pipeline.ingest_directory("docs", "notes/").await?;
//! let answer = pipeline.ask("docs", "What reduces cognitive load?").await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::config::RagConfig;
use crate::document::{Chunk, Document, SearchResult};
use crate::embedding::{EmbeddingProvider, check_batch};
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;
use crate::loader::load_directory;
use crate::retriever::{Reranker, Retriever};
use crate::synthesizer::{Answer, AnswerSynthesizer};
use crate::vectorstore::{CollectionStats, VectorStore};

/// A document that made it into the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedDocument {
    /// The document id.
    pub id: String,
    /// Number of chunks stored for it (zero for an empty document).
    pub chunk_count: usize,
}

/// A document that could not be ingested.
#[derive(Debug)]
pub struct IngestFailure {
    /// Document id, or the file path when loading failed.
    pub source: String,
    /// Why it failed.
    pub error: RagError,
}

/// Outcome of a multi-document ingest.
///
/// Failures do not roll back documents that were already stored.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Documents stored, in processing order.
    pub documents: Vec<IngestedDocument>,
    /// Documents skipped, in processing order.
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    /// Total chunks stored across all documents.
    pub fn chunk_count(&self) -> usize {
        self.documents.iter().map(|d| d.chunk_count).sum()
    }

    /// `true` when there was input and none of it was stored.
    pub fn all_failed(&self) -> bool {
        self.documents.is_empty() && !self.failures.is_empty()
    }

    fn record(&mut self, source: String, outcome: Result<Vec<Chunk>>) {
        match outcome {
            Ok(chunks) => {
                self.documents.push(IngestedDocument { id: source, chunk_count: chunks.len() })
            }
            Err(error) => {
                warn!(document.id = %source, error = %error, "skipping document");
                self.failures.push(IngestFailure { source, error });
            }
        }
    }
}

/// The RAG pipeline orchestrator.
///
/// Ingests are serialized through an internal lock so that one process
/// never has two writers interleaving on the same index. Queries do not
/// take the lock; the vector store makes each write batch visible at once.
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    retriever: Retriever,
    synthesizer: Option<AnswerSynthesizer>,
    ingest_lock: Mutex<()>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Create a named collection sized for the configured embedder.
    ///
    /// Idempotent for an existing collection of the same dimension.
    ///
    /// # Errors
    ///
    /// [`RagError::DimensionMismatch`] if the collection exists with
    /// vectors from another embedder.
    pub async fn create_collection(&self, name: &str) -> Result<()> {
        let dimensions = self.embedding_provider.dimensions();
        self.vector_store.create_collection(name, dimensions).await.inspect_err(|e| {
            error!(collection = name, error = %e, "failed to create collection");
        })
    }

    /// Delete a named collection and everything in it.
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        let _guard = self.ingest_lock.lock().await;
        self.vector_store.delete_collection(name).await.inspect_err(|e| {
            error!(collection = name, error = %e, "failed to delete collection");
        })
    }

    /// Entry counts for a collection.
    pub async fn stats(&self, collection: &str) -> Result<CollectionStats> {
        self.vector_store.stats(collection).await
    }

    /// Ingest a single document: chunk → embed → store.
    ///
    /// The document's previous chunks, if any, are replaced as a whole.
    /// Returns the stored chunks with embeddings attached.
    ///
    /// # Errors
    ///
    /// The embedding or storage error, with its original kind. Nothing is
    /// stored for the document on failure.
    pub async fn ingest(&self, collection: &str, document: &Document) -> Result<Vec<Chunk>> {
        let _guard = self.ingest_lock.lock().await;
        self.ingest_locked(collection, document).await
    }

    /// Ingest several documents, continuing past individual failures.
    pub async fn ingest_batch(&self, collection: &str, documents: &[Document]) -> IngestReport {
        let _guard = self.ingest_lock.lock().await;
        let mut report = IngestReport::default();
        for document in documents {
            let outcome = self.ingest_locked(collection, document).await;
            report.record(document.id.clone(), outcome);
        }
        info!(
            collection,
            documents = report.documents.len(),
            failures = report.failures.len(),
            chunks = report.chunk_count(),
            "batch ingest completed"
        );
        report
    }

    /// Load and ingest every file below `dir`.
    ///
    /// Files are read (and PDFs extracted) on the blocking thread pool.
    ///
    /// Unsupported or unreadable files are reported in the
    /// [`IngestReport`] alongside documents that failed to embed or store.
    ///
    /// # Errors
    ///
    /// - [`RagError::ReadError`] if `dir` is not a readable directory.
    /// - [`RagError::PipelineError`] if the loader task panicked.
    pub async fn ingest_directory(
        &self,
        collection: &str,
        dir: impl AsRef<Path>,
    ) -> Result<IngestReport> {
        let dir = dir.as_ref().to_path_buf();
        let loaded = tokio::task::spawn_blocking({
            let dir = dir.clone();
            move || load_directory(dir)
        })
        .await
        .map_err(|e| RagError::PipelineError(format!("document loader task failed: {e}")))??;

        let _guard = self.ingest_lock.lock().await;
        let mut report = IngestReport::default();
        for (path, document) in loaded {
            match document {
                Ok(document) => {
                    let outcome = self.ingest_locked(collection, &document).await;
                    report.record(document.id, outcome);
                }
                Err(e) => report.record(path.display().to_string(), Err(e)),
            }
        }

        info!(
            collection,
            dir = %dir.display(),
            documents = report.documents.len(),
            failures = report.failures.len(),
            chunks = report.chunk_count(),
            "directory ingest completed"
        );
        Ok(report)
    }

    async fn ingest_locked(&self, collection: &str, document: &Document) -> Result<Vec<Chunk>> {
        let mut chunks = self.chunker.chunk(document);

        if !chunks.is_empty() {
            let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedding_provider.embed_batch(&texts).await.inspect_err(|e| {
                error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
            })?;
            check_batch(
                self.embedding_provider.name(),
                chunks.len(),
                self.embedding_provider.dimensions(),
                &embeddings,
            )?;

            for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
                chunk.embedding = embedding;
            }
        }

        self.vector_store.replace_document(collection, &document.id, &chunks).await.inspect_err(
            |e| error!(document.id = %document.id, error = %e, "store failed during ingestion"),
        )?;

        info!(document.id = %document.id, chunk_count = chunks.len(), "ingested document");
        Ok(chunks)
    }

    /// Retrieve the configured `top_k` chunks for `query`.
    pub async fn retrieve(&self, collection: &str, query: &str) -> Result<Vec<SearchResult>> {
        self.retrieve_top_k(collection, query, self.config.top_k).await
    }

    /// Retrieve up to `top_k` chunks for `query`, best first.
    pub async fn retrieve_top_k(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.retriever.retrieve(collection, query, top_k).await
    }

    /// Answer `question` from the configured `top_k` chunks.
    pub async fn ask(&self, collection: &str, question: &str) -> Result<Answer> {
        self.ask_top_k(collection, question, self.config.top_k).await
    }

    /// Retrieve up to `top_k` chunks and synthesize an answer from them.
    ///
    /// An empty retrieval still produces an answer, flagged by
    /// [`Answer::has_sources`] returning `false`.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidConfig`] if no generation provider was configured.
    /// - The retrieval or generation error, with its original kind.
    pub async fn ask_top_k(
        &self,
        collection: &str,
        question: &str,
        top_k: usize,
    ) -> Result<Answer> {
        let synthesizer = self.synthesizer.as_ref().ok_or_else(|| {
            RagError::InvalidConfig("a generation provider is required to answer".to_string())
        })?;

        let results = self.retrieve_top_k(collection, question, top_k).await?;
        if results.is_empty() {
            warn!(collection, "no chunks retrieved, answering without sources");
        }
        let answer = synthesizer.synthesize(question, results).await?;

        info!(collection, citations = answer.citations.len(), "query completed");
        Ok(answer)
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedding_provider` and `vector_store` are required. Without
/// a chunker the pipeline uses a [`FixedSizeChunker`] sized from the config;
/// without a generation provider it can ingest and retrieve but not answer.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .vector_store(Arc::new(store))
///     .chunker(Arc::new(SentenceChunker::new(512, 50)?))  // optional
///     .reranker(Arc::new(reranker))                        // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    reranker: Option<Arc<dyn Reranker>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Override the default fixed-size chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set an optional reranker for post-search result reordering.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Set the model used to answer questions.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Build the [`RagPipeline`], validating the config and required fields.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if a required field is missing or
    /// the config fails [`RagConfig::validate`].
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::InvalidConfig("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::InvalidConfig("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::InvalidConfig("vector_store is required".to_string()))?;

        let chunker: Arc<dyn Chunker> = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)?),
        };

        let mut retriever = Retriever::new(embedding_provider.clone(), vector_store.clone())
            .with_similarity_threshold(config.similarity_threshold);
        if let Some(reranker) = self.reranker {
            retriever = retriever.with_reranker(reranker);
        }

        let synthesizer = self
            .generation_provider
            .map(|generator| AnswerSynthesizer::new(generator, config.max_context_chars))
            .transpose()?;

        Ok(RagPipeline {
            config,
            embedding_provider,
            vector_store,
            chunker,
            retriever,
            synthesizer,
            ingest_lock: Mutex::new(()),
        })
    }
}
