//! Model completion collaborator.
//!
//! [`CompletionClient`] is a single-shot, non-streaming text completion seam.
//! [`OpenAiClient`] speaks the OpenAI chat-completions wire format and
//! [`MockClient`] answers offline.

mod error;
mod mock;
mod openai;

use async_trait::async_trait;

pub use error::LlmError;
pub use mock::{MOCK_COMPLETION, MockClient};
pub use openai::{DEFAULT_BASE_URL, OpenAiClient};

/// Result of one completion call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    /// Generated text; `None` when the provider returned no content.
    pub text: Option<String>,
}

/// Issues one completion request per call, with no retries.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Completes `prompt` with the model `model_id`.
    async fn complete(&self, prompt: &str, model_id: &str) -> Result<Completion, LlmError>;
}
