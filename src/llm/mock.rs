//! Offline [`CompletionClient`] with scripted replies.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{Completion, CompletionClient, LlmError};

/// Completion returned when no scripted response is queued.
pub const MOCK_COMPLETION: &str = r#"{"score": 0.5}"#;

/// Offline completion client.
///
/// Returns queued responses first (in order), then `default_response`. Clones
/// share the queue.
#[derive(Debug, Clone)]
pub struct MockClient {
    responses: Arc<Mutex<VecDeque<Option<String>>>>,
    /// Text returned once the queue is empty.
    pub default_response: String,
    /// Sleep before every reply.
    pub delay: Duration,
    /// Fail every call with [`LlmError::Other`].
    pub fail: bool,
}

impl Default for MockClient {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            default_response: MOCK_COMPLETION.into(),
            delay: Duration::ZERO,
            fail: false,
        }
    }
}

impl MockClient {
    /// Queues responses; `None` yields a completion without text.
    #[must_use]
    pub fn with_responses(responses: Vec<Option<String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            ..Self::default()
        }
    }

    /// Client whose every call fails with a transport-level error.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Responses still queued.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl CompletionClient for MockClient {
    async fn complete(&self, _prompt: &str, _model_id: &str) -> Result<Completion, LlmError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(LlmError::Other("mock completion error".into()));
        }
        let queued = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let text = match queued {
            Some(text) => text,
            None => Some(self.default_response.clone()),
        };
        Ok(Completion { text })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queued_responses_then_default() {
        let client = MockClient::with_responses(vec![Some("first".into()), None]);
        let a = client.complete("p", "m").await.unwrap();
        let b = client.complete("p", "m").await.unwrap();
        let c = client.complete("p", "m").await.unwrap();
        assert_eq!(a.text.as_deref(), Some("first"));
        assert!(b.text.is_none());
        assert_eq!(c.text.as_deref(), Some(MOCK_COMPLETION));
        assert_eq!(client.remaining(), 0);
    }

    #[tokio::test]
    async fn test_failing_client_errors() {
        let client = MockClient::failing();
        assert!(client.complete("p", "m").await.is_err());
    }
}
