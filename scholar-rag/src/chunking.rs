//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`] — fixed character windows with configurable overlap
//! - [`SentenceChunker`] — splits hierarchically by paragraphs, sentences,
//!   words, then characters
//!
//! Sizes and offsets are measured in characters, never bytes, so multi-byte
//! text is never cut inside a code point.

use std::ops::Range;

use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text, offsets and metadata but no
/// embeddings. Embeddings are attached later by the pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    /// Each returned chunk has an empty embedding vector.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Check that `chunk_size` and `chunk_overlap` describe a stride that advances.
pub fn validate_chunk_params(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::InvalidConfig("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::InvalidConfig(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Split `document` into fixed-size windows in one call.
///
/// # Errors
///
/// Returns [`RagError::InvalidConfig`] if `chunk_size == 0` or
/// `chunk_overlap >= chunk_size`.
pub fn chunk_document(
    document: &Document,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>> {
    Ok(FixedSizeChunker::new(chunk_size, chunk_overlap)?.chunk(document))
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// The window advances by `chunk_size - chunk_overlap` characters until the
/// tail of the text is consumed; the last chunk may be shorter. Chunk IDs are
/// generated as `{document_id}_{chunk_index}`. Each chunk inherits the parent
/// document's metadata plus a `chunk_index` field.
///
/// # Example
///
/// ```rust,ignore
/// use scholar_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum number of characters per chunk
    /// * `chunk_overlap` — number of overlapping characters between consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if `chunk_size == 0` or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunk_params(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let bounds = CharBounds::new(&document.text);
        fixed_windows(bounds.char_count(), self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(index, chars)| build_chunk(document, &bounds, index, chars))
            .collect()
    }
}

/// Splits text hierarchically: paragraphs → sentences → words → characters.
///
/// First splits by paragraph separators (`\n\n`). Pieces are merged greedily
/// while they fit in `chunk_size`; a piece that is still too large is split
/// at sentence boundaries (`. `, `! `, `? `), then at spaces, and finally by
/// fixed character windows. Separators stay attached to the preceding piece,
/// so chunks are contiguous slices of the source text. When a new chunk
/// starts, trailing pieces of the previous one are repeated up to
/// `chunk_overlap` characters.
///
/// # Example
///
/// ```rust,ignore
/// use scholar_rag::SentenceChunker;
///
/// let chunker = SentenceChunker::new(512, 50)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SentenceChunker {
    /// Create a new `SentenceChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if `chunk_size == 0` or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunk_params(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

const SEPARATORS: [&str; 5] = ["\n\n", ". ", "! ", "? ", " "];

impl Chunker for SentenceChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() {
            return Vec::new();
        }

        let bounds = CharBounds::new(&document.text);
        let splitter = RangeSplitter {
            text: &document.text,
            bounds: &bounds,
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        };

        splitter
            .split(0..document.text.len(), &SEPARATORS)
            .into_iter()
            .enumerate()
            .map(|(index, bytes)| {
                let chars = bounds.char_index(bytes.start)..bounds.char_index(bytes.end);
                build_chunk(document, &bounds, index, chars)
            })
            .collect()
    }
}

/// Character windows `[start, end)` over `n` characters.
fn fixed_windows(n: usize, chunk_size: usize, chunk_overlap: usize) -> Vec<Range<usize>> {
    let mut windows = Vec::new();
    if n == 0 {
        return windows;
    }

    let step = chunk_size - chunk_overlap;
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(n);
        windows.push(start..end);
        if end == n {
            break;
        }
        start += step;
    }
    windows
}

fn build_chunk(
    document: &Document,
    bounds: &CharBounds,
    index: usize,
    chars: Range<usize>,
) -> Chunk {
    let mut metadata = document.metadata.clone();
    metadata.insert("chunk_index".to_string(), index.to_string());

    Chunk {
        id: format!("{}_{index}", document.id),
        text: document.text[bounds.byte_range(chars.clone())].to_string(),
        embedding: Vec::new(),
        metadata,
        document_id: document.id.clone(),
        start_offset: chars.start,
        end_offset: chars.end,
    }
}

/// Byte offsets of every character boundary, including the end of the text.
struct CharBounds {
    offsets: Vec<usize>,
}

impl CharBounds {
    fn new(text: &str) -> Self {
        let offsets =
            text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        Self { offsets }
    }

    fn char_count(&self) -> usize {
        self.offsets.len() - 1
    }

    fn byte_range(&self, chars: Range<usize>) -> Range<usize> {
        self.offsets[chars.start]..self.offsets[chars.end]
    }

    /// Character index of a byte offset that lies on a boundary.
    fn char_index(&self, byte: usize) -> usize {
        self.offsets.binary_search(&byte).unwrap_or_else(|i| i)
    }

    fn chars_in(&self, bytes: &Range<usize>) -> usize {
        self.char_index(bytes.end) - self.char_index(bytes.start)
    }
}

struct RangeSplitter<'a> {
    text: &'a str,
    bounds: &'a CharBounds,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RangeSplitter<'_> {
    /// Split a byte range into ranges of at most `chunk_size` characters.
    fn split(&self, range: Range<usize>, separators: &[&str]) -> Vec<Range<usize>> {
        if self.bounds.chars_in(&range) <= self.chunk_size {
            return vec![range];
        }

        let Some((separator, remaining)) = separators.split_first() else {
            return self.split_fixed(range);
        };

        let segments = self.split_keeping_separator(range.clone(), separator);
        if segments.len() <= 1 {
            return self.split(range, remaining);
        }

        let mut chunks = Vec::new();
        let mut current: Vec<Range<usize>> = Vec::new();

        for segment in segments {
            if let Some(first) = current.first() {
                if self.bounds.chars_in(&(first.start..segment.end)) > self.chunk_size {
                    chunks.extend(self.flush(&current, remaining));
                    current = self.overlap_tail(&current, &segment);
                }
            }
            current.push(segment);
        }
        if !current.is_empty() {
            chunks.extend(self.flush(&current, remaining));
        }

        chunks
    }

    fn flush(&self, segments: &[Range<usize>], remaining: &[&str]) -> Vec<Range<usize>> {
        let (Some(first), Some(last)) = (segments.first(), segments.last()) else {
            return Vec::new();
        };
        let merged = first.start..last.end;
        if self.bounds.chars_in(&merged) > self.chunk_size {
            self.split(merged, remaining)
        } else {
            vec![merged]
        }
    }

    /// Trailing segments of the previous chunk to repeat before `next`.
    fn overlap_tail(&self, previous: &[Range<usize>], next: &Range<usize>) -> Vec<Range<usize>> {
        let next_len = self.bounds.chars_in(next);
        let mut total = 0;
        let mut tail = Vec::new();

        for segment in previous.iter().rev() {
            let len = self.bounds.chars_in(segment);
            if total + len > self.chunk_overlap || total + len + next_len > self.chunk_size {
                break;
            }
            total += len;
            tail.push(segment.clone());
        }

        tail.reverse();
        tail
    }

    /// Split a range at `separator`, keeping the separator on the preceding piece.
    fn split_keeping_separator(&self, range: Range<usize>, separator: &str) -> Vec<Range<usize>> {
        let slice = &self.text[range.clone()];
        let mut pieces = Vec::new();
        let mut offset = 0;

        while let Some(pos) = slice[offset..].find(separator) {
            let end = offset + pos + separator.len();
            pieces.push(range.start + offset..range.start + end);
            offset = end;
        }
        if offset < slice.len() {
            pieces.push(range.start + offset..range.end);
        }

        pieces
    }

    fn split_fixed(&self, range: Range<usize>) -> Vec<Range<usize>> {
        let first = self.bounds.char_index(range.start);
        let n = self.bounds.chars_in(&range);
        fixed_windows(n, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .map(|w| self.bounds.byte_range(first + w.start..first + w.end))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new("doc", text)
    }

    #[test]
    fn rejects_invalid_params() {
        assert!(matches!(FixedSizeChunker::new(0, 0), Err(RagError::InvalidConfig(_))));
        assert!(matches!(FixedSizeChunker::new(10, 10), Err(RagError::InvalidConfig(_))));
        assert!(matches!(SentenceChunker::new(10, 12), Err(RagError::InvalidConfig(_))));
        assert!(FixedSizeChunker::new(10, 9).is_ok());
    }

    #[test]
    fn short_document_is_one_chunk() {
        let chunks = chunk_document(&doc("Obsidian is for networked thinking."), 50, 10).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Obsidian is for networked thinking.");
        assert_eq!(chunks[0].id, "doc_0");
        assert_eq!((chunks[0].start_offset, chunks[0].end_offset), (0, 35));
        assert_eq!(chunks[0].metadata.get("chunk_index").map(String::as_str), Some("0"));
    }

    #[test]
    fn exact_size_document_is_one_chunk() {
        let text = "a".repeat(50);
        let chunks = chunk_document(&doc(&text), 50, 10).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn windows_stride_by_size_minus_overlap() {
        let text: String = ('a'..='z').collect();
        let chunks = chunk_document(&doc(&text), 10, 4).unwrap();
        let spans: Vec<_> = chunks.iter().map(|c| (c.start_offset, c.end_offset)).collect();
        assert_eq!(spans, vec![(0, 10), (6, 16), (12, 22), (18, 26)]);
        assert_eq!(chunks[1].text, "ghijklmnop");
        assert_eq!(chunks[3].char_len(), 8);
    }

    #[test]
    fn empty_document_has_no_chunks() {
        assert!(chunk_document(&doc(""), 10, 2).unwrap().is_empty());
        assert!(SentenceChunker::new(10, 2).unwrap().chunk(&doc("")).is_empty());
    }

    #[test]
    fn multibyte_text_is_split_on_characters() {
        let text = "ééééé ññññ ü";
        let chunks = chunk_document(&doc(text), 4, 1).unwrap();
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 4);
            let expected: String =
                text.chars().skip(chunk.start_offset).take(chunk.char_len()).collect();
            assert_eq!(chunk.text, expected);
        }
        assert_eq!(chunks.last().unwrap().end_offset, text.chars().count());
    }

    #[test]
    fn sentence_chunker_prefers_sentence_boundaries() {
        let text = "First sentence here. Second sentence here. Third one.";
        let chunks = SentenceChunker::new(25, 0).unwrap().chunk(&doc(text));
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["First sentence here. ", "Second sentence here. ", "Third one."]);
        assert_eq!(chunks[1].start_offset, 21);
    }

    #[test]
    fn sentence_chunker_repeats_trailing_sentence_as_overlap() {
        let text = "One. Two. Three. Four.";
        let chunks = SentenceChunker::new(12, 5).unwrap().chunk(&doc(text));
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["One. Two. ", "Two. Three. ", "Four."]);
        assert_eq!(chunks[1].start_offset, 5);
    }

    #[test]
    fn sentence_chunker_falls_back_to_characters() {
        let text = "x".repeat(25);
        let chunks = SentenceChunker::new(10, 0).unwrap().chunk(&doc(&text));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].text.len(), 5);
    }
}
