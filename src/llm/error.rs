//! Completion client errors and their batch failure kinds.

use thiserror::Error;

use crate::batch::ItemError;

/// Errors from a completion request.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Connection, timeout, or body-read failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP 429 from the provider.
    #[error("rate limited")]
    RateLimited,

    /// Any other non-success status, with the response body.
    #[error("completion request failed (status {status}): {body}")]
    Status { status: u16, body: String },

    /// The response carried no choices.
    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    /// The API key was empty or whitespace.
    #[error("no API key configured")]
    MissingApiKey,

    #[error("{0}")]
    Other(String),
}

impl From<LlmError> for ItemError {
    fn from(error: LlmError) -> Self {
        let message = error.to_string();
        match error {
            LlmError::EmptyResponse { .. } => Self::EmptyResult(message),
            LlmError::Json(_) => Self::Parse(message),
            LlmError::Http(_)
            | LlmError::RateLimited
            | LlmError::Status { .. }
            | LlmError::MissingApiKey
            | LlmError::Other(_) => Self::Transport(message),
        }
    }
}
