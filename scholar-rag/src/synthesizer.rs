//! Answer synthesis from retrieved chunks.
//!
//! The synthesizer packs retrieved chunks into a bounded context, best
//! first, asks a [`GenerationProvider`] to answer from it, and cites
//! exactly the chunks that made it into the prompt.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::document::SearchResult;
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;

const CONTEXT_RULE: &str = "---------------------";

/// A generated answer with the chunks it was grounded on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// The generated text.
    pub text: String,
    /// Chunks included in the prompt context, in descending score order.
    pub citations: Vec<SearchResult>,
}

impl Answer {
    /// `false` when the model answered without any retrieved context.
    pub fn has_sources(&self) -> bool {
        !self.citations.is_empty()
    }
}

/// Builds prompts from search results and calls a generation backend.
///
/// # Example
///
/// ```rust,ignore
/// let synthesizer = AnswerSynthesizer::new(Arc::new(provider), 4000)?;
/// let answer = synthesizer.synthesize("What reduces cognitive load?", results).await?;
/// ```
#[derive(Clone)]
pub struct AnswerSynthesizer {
    generator: Arc<dyn GenerationProvider>,
    max_context_chars: usize,
}

impl AnswerSynthesizer {
    /// Create a synthesizer whose context holds at most `max_context_chars`
    /// characters of chunk text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if `max_context_chars` is zero.
    pub fn new(generator: Arc<dyn GenerationProvider>, max_context_chars: usize) -> Result<Self> {
        if max_context_chars == 0 {
            return Err(RagError::InvalidConfig(
                "max_context_chars must be greater than zero".to_string(),
            ));
        }
        Ok(Self { generator, max_context_chars })
    }

    /// Answer `query` from `results`.
    ///
    /// Results must already be ordered best first. Chunks are taken in that
    /// order until the next one would exceed the context budget; everything
    /// from that point on is left out of both the prompt and the citations.
    ///
    /// # Errors
    ///
    /// Propagates the backend's [`RagError::GenerationError`] unchanged.
    pub async fn synthesize(&self, query: &str, results: Vec<SearchResult>) -> Result<Answer> {
        let retrieved = results.len();
        let citations = select_context(results, self.max_context_chars);
        if citations.len() < retrieved {
            warn!(
                retrieved,
                included = citations.len(),
                max_context_chars = self.max_context_chars,
                "context budget exceeded, dropping lower-ranked chunks"
            );
        }

        let prompt = build_prompt(query, &citations);
        let text = self.generator.generate(&prompt).await.inspect_err(|e| {
            error!(provider = self.generator.name(), error = %e, "generation failed");
        })?;

        info!(citations = citations.len(), answer_len = text.len(), "synthesized answer");
        Ok(Answer { text, citations })
    }
}

/// The longest prefix of `results` whose chunk texts fit in `max_chars`.
pub fn select_context(results: Vec<SearchResult>, max_chars: usize) -> Vec<SearchResult> {
    let mut used = 0;
    results
        .into_iter()
        .take_while(|r| {
            let len = r.chunk.text.chars().count();
            if used + len > max_chars {
                return false;
            }
            used += len;
            true
        })
        .collect()
}

/// Render the prompt sent to the generation backend.
///
/// With no context the model is told that nothing was retrieved, so it can
/// say so instead of inventing sources.
pub fn build_prompt(query: &str, context: &[SearchResult]) -> String {
    if context.is_empty() {
        return format!(
            "No documents in the knowledge base matched this question.\n\
             Answer from general knowledge and state clearly that no sources were found.\n\
             Query: {query}\n\
             Answer: "
        );
    }

    let blocks: Vec<String> = context
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[{}] Source: {}\n{}", i + 1, r.source_name(), r.chunk.text))
        .collect();

    format!(
        "Context information is below.\n\
         {CONTEXT_RULE}\n\
         {}\n\
         {CONTEXT_RULE}\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Cite sources by their bracketed number.\n\
         Query: {query}\n\
         Answer: ",
        blocks.join("\n\n")
    )
}
