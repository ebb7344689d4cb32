//! CompletionProvider trait — the abstraction over text-completion backends.
//!
//! A provider knows how to send one prompt string to a remote model and get
//! the generated text back: single-shot, stateless, no streaming.
//!
//! Implementations: OpenAI-compatible endpoints, scripted mocks for tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;

/// The core CompletionProvider trait.
///
/// The chat engine calls `complete()` without knowing which backend is in
/// use. Every call carries its own deadline; on expiry the provider must
/// return [`ProviderError::Timeout`] rather than block indefinitely.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Send a prompt and return the generated text.
    async fn complete(
        &self,
        prompt: &str,
        deadline: Duration,
    ) -> std::result::Result<String, ProviderError>;

    /// Health check — can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
