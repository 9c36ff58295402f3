//! Error types for page fetching.

use thiserror::Error;

use crate::batch::ItemError;

/// Errors that can occur while fetching a page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL is malformed or uses an unsupported scheme.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The body exceeded the configured size cap.
    #[error("body of {url} exceeds {limit} bytes")]
    TooLarge {
        /// The URL whose body was too large.
        url: String,
        /// The configured cap in bytes.
        limit: usize,
    },

    /// The response is not HTML or plain text.
    #[error("unsupported content type {content_type} at {url}")]
    UnsupportedContent {
        /// The URL that was fetched.
        url: String,
        /// Declared content type.
        content_type: String,
    },
}

impl FetchError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a network error, promoting reqwest timeouts to [`FetchError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::timeout(url);
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a body-too-large error.
    pub fn too_large(url: impl Into<String>, limit: usize) -> Self {
        Self::TooLarge {
            url: url.into(),
            limit,
        }
    }

    /// Creates an unsupported-content error.
    pub fn unsupported_content(url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self::UnsupportedContent {
            url: url.into(),
            content_type: content_type.into(),
        }
    }
}

impl From<FetchError> for ItemError {
    fn from(error: FetchError) -> Self {
        let message = error.to_string();
        match error {
            FetchError::TooLarge { .. } => Self::ResourceExhausted(message),
            FetchError::UnsupportedContent { .. } => Self::EmptyResult(message),
            // Retrying cannot repair a malformed or non-HTTP link.
            FetchError::InvalidUrl { .. } => Self::Parse(message),
            FetchError::Network { .. }
            | FetchError::Timeout { .. }
            | FetchError::HttpStatus { .. } => Self::Transport(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::FailureKind;

    #[test]
    fn test_fetch_error_http_status_display() {
        let msg = FetchError::http_status("https://example.com/a", 404).to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(msg.contains("https://example.com/a"));
    }

    #[test]
    fn test_fetch_error_maps_to_item_error_kind() {
        let cases = [
            (FetchError::timeout("u"), FailureKind::Transport),
            (FetchError::http_status("u", 500), FailureKind::Transport),
            (FetchError::invalid_url("u"), FailureKind::Parse),
            (FetchError::too_large("u", 10), FailureKind::ResourceExhaustion),
            (
                FetchError::unsupported_content("u", "image/png"),
                FailureKind::EmptyResult,
            ),
        ];
        for (error, kind) in cases {
            assert_eq!(ItemError::from(error).kind(), kind);
        }
    }

    #[test]
    fn test_invalid_url_is_not_transient() {
        let kind = ItemError::from(FetchError::invalid_url("mailto:x@y.z")).kind();
        assert!(!kind.is_transient());
    }
}
