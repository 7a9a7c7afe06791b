//! # scholar-rag
//!
//! Retrieval-augmented question answering over a local document collection.
//!
//! ## Overview
//!
//! Documents flow through two pipelines:
//!
//! - **ingest**: [`loader`] → [`Chunker`] → [`EmbeddingProvider`] → [`VectorStore`]
//! - **query**: [`Retriever`] → [`AnswerSynthesizer`] → [`Answer`] with citations
//!
//! [`RagPipeline`] composes both. The in-memory index persists to a single
//! JSON snapshot, and [`HashEmbeddingProvider`] works without any model so
//! the whole crate runs offline.
//!
//! ## Features
//!
//! - `openai` - [`OpenAIEmbeddingProvider`](openai::OpenAIEmbeddingProvider)
//! - `ollama` - [`OllamaEmbeddingProvider`](ollama::OllamaEmbeddingProvider)
//! - `anthropic` - [`AnthropicGenerationProvider`](anthropic::AnthropicGenerationProvider)
//! - `full` - all of the above
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use scholar_rag::{HashEmbeddingProvider, InMemoryVectorStore, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::default()))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//!
//! pipeline.create_collection("notes").await?;
//! pipeline.ingest_directory("notes", "./notes").await?;
//! let hits = pipeline.retrieve("notes", "what reduces cognitive load?").await?;
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod hash;
pub mod inmemory;
pub mod loader;
pub mod pipeline;
pub mod retriever;
pub mod synthesizer;
pub mod vectorstore;

#[cfg(feature = "anthropic")]
pub mod anthropic;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, FixedSizeChunker, SentenceChunker, chunk_document};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, DocumentFormat, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generation::GenerationProvider;
pub use hash::HashEmbeddingProvider;
pub use inmemory::InMemoryVectorStore;
pub use loader::{discover_documents, load_directory, load_document, load_document_in};
pub use pipeline::{IngestFailure, IngestReport, IngestedDocument, RagPipeline, RagPipelineBuilder};
pub use retriever::{NoOpReranker, Reranker, Retriever};
pub use synthesizer::{Answer, AnswerSynthesizer};
pub use vectorstore::{CollectionStats, VectorStore};
