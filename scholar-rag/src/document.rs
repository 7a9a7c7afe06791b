//! Data types for documents, chunks, and search results.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The source format a [`Document`] was loaded from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Plain UTF-8 text.
    Text,
    /// Markdown, kept verbatim.
    Markdown,
    /// PDF, reduced to its extracted text.
    Pdf,
}

impl DocumentFormat {
    /// Resolve a format from a file extension (case-insensitive).
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "txt" | "text" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Resolve a format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(|ext| ext.to_str()).and_then(Self::from_extension)
    }

    /// The lowercase tag used in metadata and snapshots.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source document containing text content and metadata.
///
/// Documents are never mutated after loading. Re-ingesting the same source
/// produces a new `Document` with the same `id` that supersedes the old one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// The format the text was loaded from.
    pub format: DocumentFormat,
    /// Key-value metadata associated with the document.
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
    /// When the document was loaded.
    pub ingested_at: DateTime<Utc>,
}

impl Document {
    /// Create an in-memory text document with no source and empty metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            format: DocumentFormat::Text,
            metadata: HashMap::new(),
            source_uri: None,
            ingested_at: Utc::now(),
        }
    }

    /// Attach one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the source URI.
    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self
    }

    /// Number of characters (not bytes) in the text.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A segment of a [`Document`] with its vector embedding.
///
/// Offsets are character positions in the parent document's text, end
/// exclusive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk, `{document_id}_{chunk_index}`.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The vector embedding for this chunk's text.
    pub embedding: Vec<f32>,
    /// Key-value metadata inherited from the parent document plus chunk-specific fields.
    pub metadata: HashMap<String, String>,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// First character of the chunk in the parent text.
    pub start_offset: usize,
    /// One past the last character of the chunk in the parent text.
    pub end_offset: usize,
}

impl Chunk {
    /// Chunk size in characters.
    pub fn char_len(&self) -> usize {
        self.end_offset - self.start_offset
    }
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

impl SearchResult {
    /// The `file_name` metadata of the source, falling back to the document id.
    pub fn source_name(&self) -> &str {
        self.chunk.metadata.get("file_name").map_or(&self.chunk.document_id, String::as_str)
    }
}
