//! Chat-completions client for OpenAI-compatible endpoints.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Completion, CompletionClient, LlmError};

/// Default API root for OpenAI-compatible providers.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Single-shot chat-completions client for OpenAI-compatible APIs.
///
/// Sends one user message per call and returns the first choice's text.
/// Rate limiting is reported as [`LlmError::RateLimited`] and never retried
/// here.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiClient {
    /// Creates a client for `base_url` (trailing slashes are ignored).
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::MissingApiKey`] for a blank key and
    /// [`LlmError::Http`] if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, api_key, base_url))
    }

    /// Wraps an existing reqwest client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client,
            api_key: api_key.into(),
            base_url,
        }
    }

    /// API root requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &str, model_id: &str) -> Result<Completion, LlmError> {
        let messages = [ApiMessage {
            role: "user",
            content: prompt,
        }];
        let body = ChatRequest {
            model: model_id,
            messages: &messages,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            tracing::error!("completion API error {status}: {text}");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let resp: ChatResponse = serde_json::from_str(&text)?;
        resp.choices
            .into_iter()
            .next()
            .map(|c| Completion {
                text: c.message.content,
            })
            .ok_or(LlmError::EmptyResponse { provider: "openai" })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage<'a>],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slashes_trimmed() {
        let client = OpenAiClient::with_client(reqwest::Client::new(), "k", "http://localhost/v1//");
        assert_eq!(client.base_url(), "http://localhost/v1");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let client = OpenAiClient::with_client(reqwest::Client::new(), "sk-secret", DEFAULT_BASE_URL);
        let debug = format!("{client:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_blank_api_key_rejected() {
        assert!(matches!(
            OpenAiClient::new("  ", DEFAULT_BASE_URL),
            Err(LlmError::MissingApiKey)
        ));
    }

    #[test]
    fn test_request_serializes_without_stream_flag() {
        let messages = [ApiMessage {
            role: "user",
            content: "hi",
        }];
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("stream").is_none());
    }

    #[test]
    fn test_response_with_null_content_parses() {
        let resp: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
                .unwrap();
        assert!(resp.choices[0].message.content.is_none());
    }
}
