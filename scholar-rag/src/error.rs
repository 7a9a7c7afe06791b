//! Error types for the `scholar-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// A source document could not be read.
    #[error("Read error ({}): {source}", path.display())]
    ReadError {
        /// The path that failed to read.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The loader does not recognize the document format.
    #[error("Unsupported format '{format}' for {}", path.display())]
    UnsupportedFormat {
        /// The offending path.
        path: PathBuf,
        /// The extension (or `<none>`) that was not recognized.
        format: String,
    },

    /// A configuration validation error.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation backend failed or timed out.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector does not match the dimensionality of its collection.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The collection's declared dimension.
        expected: usize,
        /// The length of the rejected vector.
        actual: usize,
    },

    /// A persisted index could not be loaded.
    #[error("Index corruption ({}): {message}", path.display())]
    IndexCorruption {
        /// The snapshot file.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during result reranking.
    #[error("Reranker error ({reranker}): {message}")]
    RerankerError {
        /// The reranker that produced the error.
        reranker: String,
        /// A description of the failure.
        message: String,
    },

    /// An error in the RAG pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl RagError {
    /// Build a [`RagError::ReadError`] for `path`.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError { path: path.into(), source }
    }

    /// A short, stable name for the error kind, used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReadError { .. } => "ReadError",
            Self::UnsupportedFormat { .. } => "UnsupportedFormat",
            Self::InvalidConfig(_) => "InvalidConfig",
            Self::EmbeddingError { .. } => "EmbeddingError",
            Self::GenerationError { .. } => "GenerationError",
            Self::DimensionMismatch { .. } => "DimensionMismatch",
            Self::IndexCorruption { .. } => "IndexCorruption",
            Self::VectorStoreError { .. } => "VectorStoreError",
            Self::RerankerError { .. } => "RerankerError",
            Self::PipelineError(_) => "PipelineError",
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
