//! reqwest-backed [`PageSource`].

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use tracing::{debug, instrument};
use url::Url;

use super::html::{extract_page, plain_text_page};
use super::{FetchError, FetchedPage, PageSource};

/// Default connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on response body size (5 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/harvester";

/// User-Agent sent with every page request.
#[must_use]
pub fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("harvester/{version} (+{PROJECT_UA_URL})")
}

/// Fetches pages over HTTP and extracts their text and links.
///
/// Accepts `text/html` (and XHTML) or `text/plain` responses. Bodies are
/// streamed and abandoned once they exceed the byte cap. Cloning is cheap;
/// clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: Client,
    max_body_bytes: usize,
}

impl HttpPageSource {
    /// Creates a page source with the given body cap.
    ///
    /// # Errors
    ///
    /// Returns the reqwest error if the client cannot be built (for example,
    /// the TLS backend fails to initialise).
    pub fn new(max_body_bytes: usize) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .gzip(true)
            .user_agent(default_user_agent())
            .build()?;
        Ok(Self::with_client(client, max_body_bytes))
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn with_client(client: Client, max_body_bytes: usize) -> Self {
        Self {
            client,
            max_body_bytes,
        }
    }

    async fn send(&self, url: &Url, timeout: Duration) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::network(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url.as_str(), status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    #[instrument(skip(self), fields(timeout_ms = timeout.as_millis()))]
    async fn fetch_page(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::invalid_url(url));
        }

        let response = self.send(&parsed, timeout).await?;
        let final_url = response.url().clone();
        let kind = classify_content_type(&response);
        let body = read_capped_body(response, url, self.max_body_bytes).await?;

        debug!(bytes = body.len(), final_url = %final_url, "page downloaded");

        match kind {
            ContentKind::Html => Ok(extract_page(&body, &final_url)),
            ContentKind::PlainText => Ok(plain_text_page(&body)),
            ContentKind::Other(content_type) => {
                Err(FetchError::unsupported_content(url, content_type))
            }
        }
    }
}

enum ContentKind {
    Html,
    PlainText,
    Other(String),
}

fn classify_content_type(response: &Response) -> ContentKind {
    let Some(value) = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        // No header: parse as HTML.
        return ContentKind::Html;
    };
    let mime = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "text/html" | "application/xhtml+xml" => ContentKind::Html,
        "text/plain" => ContentKind::PlainText,
        _ => ContentKind::Other(mime),
    }
}

/// Streams the body into memory, failing once it exceeds `limit` bytes.
async fn read_capped_body(
    response: Response,
    url: &str,
    limit: usize,
) -> Result<String, FetchError> {
    if response
        .content_length()
        .is_some_and(|len| usize::try_from(len).map_or(true, |len| len > limit))
    {
        return Err(FetchError::too_large(url, limit));
    }

    let mut stream = response.bytes_stream();
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::network(url, e))?;
        if body.len() + chunk.len() > limit {
            return Err(FetchError::too_large(url, limit));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}
