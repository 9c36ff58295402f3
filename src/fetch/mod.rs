//! Content fetching.
//!
//! [`PageSource`] is the seam to whatever actually retrieves pages;
//! [`HttpPageSource`] implements it with reqwest and `scraper`.
//! [`ContentFetcher`] turns a fetched page into a new [`Document`] linked to
//! the document it was discovered from.
//!
//! [`Document`]: crate::document::Document

mod client;
mod error;
mod fetcher;
mod html;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use client::{DEFAULT_MAX_BODY_BYTES, HttpPageSource, default_user_agent};
pub use error::FetchError;
pub use fetcher::{ContentFetcher, FetchTarget};
pub use html::{extract_page, plain_text_page};

/// What a page source returns for one URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedPage {
    /// Extracted plain text.
    pub content: String,
    /// Links to the same host, in page order.
    pub internal_links: Vec<String>,
    /// Links to other hosts, in page order.
    pub external_links: Vec<String>,
    /// Page title, if any.
    pub title: Option<String>,
    /// Page-level metadata (meta tags).
    pub raw_metadata: Map<String, Value>,
}

/// Retrieves a page and its outgoing links.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches `url`, giving up after `timeout`.
    async fn fetch_page(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError>;
}
