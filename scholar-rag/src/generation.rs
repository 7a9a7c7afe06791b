//! Generation provider trait for answer synthesis.

use async_trait::async_trait;

use crate::error::Result;

/// A language model that turns a prompt into text.
///
/// Implementations must report failures (including timeouts) as
/// [`GenerationError`](crate::RagError::GenerationError) and must not
/// retry on their own: a generation call may already have been billed.
///
/// # Example
///
/// ```rust,ignore
/// use scholar_rag::GenerationProvider;
///
/// let text = provider.generate("Summarize: ...").await?;
/// ```
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Short provider name used in logs and error messages.
    fn name(&self) -> &str;
}
