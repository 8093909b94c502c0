//! Answer generation through an external completion service

pub mod openai;
pub mod prompt;
pub mod retry;

use async_trait::async_trait;

use crate::error::UpstreamError;

pub use openai::OpenAiClient;
pub use prompt::PromptBuilder;
pub use retry::RetryPolicy;

/// Trait for text completion services
///
/// Implementations:
/// - `OpenAiClient`: chat-completions API (gpt-4 by default)
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Complete a fully built prompt
    async fn complete(&self, prompt: &str) -> std::result::Result<String, UpstreamError>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
