//! Turns fetched pages into documents.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use super::PageSource;
use crate::batch::{BatchItem, ItemError};
use crate::document::{Document, DocumentMetadata, generate_document_id};

/// One page to fetch, with the metadata of the document that linked to it.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTarget {
    /// Page URL.
    pub url: String,
    /// Metadata of the linking document.
    pub parent: DocumentMetadata,
}

impl FetchTarget {
    /// Creates a fetch target.
    pub fn new(url: impl Into<String>, parent: DocumentMetadata) -> Self {
        Self {
            url: url.into(),
            parent,
        }
    }
}

impl BatchItem for FetchTarget {
    fn key(&self) -> String {
        self.url.clone()
    }
}

/// Fetches a URL and builds a new [`Document`] from it.
///
/// The fetcher does not retry; a failed fetch is reported once and retry
/// sweeps are left to the batch layer.
#[derive(Clone)]
pub struct ContentFetcher {
    source: Arc<dyn PageSource>,
    timeout: Duration,
}

impl fmt::Debug for ContentFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentFetcher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ContentFetcher {
    /// Creates a fetcher over `source` with a per-request timeout.
    #[must_use]
    pub fn new(source: Arc<dyn PageSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Fetches `url` and builds a document linked to `parent`.
    ///
    /// The new document gets a fresh random id. Its child URLs are the page's
    /// internal links followed by its external links, without duplicates.
    ///
    /// # Errors
    ///
    /// Returns an [`ItemError`] when the fetch fails or the page has no text.
    #[instrument(skip(self, parent), fields(parent_id = %parent.id))]
    pub async fn fetch(
        &self,
        url: &str,
        parent: &DocumentMetadata,
    ) -> Result<Document, ItemError> {
        let page = self.source.fetch_page(url, self.timeout).await?;

        if page.content.trim().is_empty() {
            return Err(ItemError::empty(format!("no content at {url}")));
        }

        let mut seen = HashSet::new();
        let child_urls: Vec<String> = page
            .internal_links
            .into_iter()
            .chain(page.external_links)
            .filter(|link| seen.insert(link.clone()))
            .collect();

        let mut metadata = DocumentMetadata::new(
            generate_document_id(),
            url,
            page.title.unwrap_or_default(),
        );
        metadata.properties = page.raw_metadata;

        debug!(
            document_id = %metadata.id,
            content_len = page.content.len(),
            links = child_urls.len(),
            "page fetched"
        );

        Ok(Document::new(metadata, page.content)
            .with_parent(parent.clone())
            .with_child_urls(child_urls))
    }

    /// Batch operation form of [`fetch`](Self::fetch): hands the target back
    /// on failure.
    ///
    /// # Errors
    ///
    /// Returns the target and its [`ItemError`] when the fetch fails.
    pub async fn fetch_target(
        &self,
        target: FetchTarget,
    ) -> Result<Document, (FetchTarget, ItemError)> {
        match self.fetch(&target.url, &target.parent).await {
            Ok(document) => Ok(document),
            Err(error) => Err((target, error)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{Map, Value};

    use super::*;
    use crate::batch::FailureKind;
    use crate::fetch::{FetchError, FetchedPage};

    struct StaticSource {
        page: Option<FetchedPage>,
    }

    #[async_trait]
    impl PageSource for StaticSource {
        async fn fetch_page(&self, url: &str, _timeout: Duration) -> Result<FetchedPage, FetchError> {
            self.page
                .clone()
                .ok_or_else(|| FetchError::http_status(url, 503))
        }
    }

    fn parent() -> DocumentMetadata {
        DocumentMetadata::new("parent-1", "https://example.com/", "Home")
    }

    fn fetcher(page: Option<FetchedPage>) -> ContentFetcher {
        ContentFetcher::new(Arc::new(StaticSource { page }), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_fetch_builds_document_with_parent_and_links() {
        let mut raw_metadata = Map::new();
        raw_metadata.insert("description".into(), Value::String("d".into()));
        let page = FetchedPage {
            content: "Hello world".into(),
            internal_links: vec!["https://example.com/a".into(), "https://example.com/b".into()],
            external_links: vec!["https://other.example/".into(), "https://example.com/a".into()],
            title: Some("Hello".into()),
            raw_metadata,
        };

        let doc = fetcher(Some(page))
            .fetch("https://example.com/hello", &parent())
            .await
            .unwrap();

        assert_eq!(doc.id.len(), 32);
        assert_eq!(doc.id, doc.metadata.id);
        assert_eq!(doc.metadata.url, "https://example.com/hello");
        assert_eq!(doc.metadata.title, "Hello");
        assert!(doc.metadata.properties.contains_key("description"));
        assert_eq!(doc.parent_metadata.unwrap().id, "parent-1");
        assert_eq!(
            doc.child_urls,
            [
                "https://example.com/a",
                "https://example.com/b",
                "https://other.example/"
            ]
        );
        assert!(doc.quality_score.is_none());
    }

    #[tokio::test]
    async fn test_fetch_blank_page_is_empty_result() {
        let page = FetchedPage {
            content: "  \n ".into(),
            ..FetchedPage::default()
        };
        let err = fetcher(Some(page))
            .fetch("https://example.com/blank", &parent())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::EmptyResult);
    }

    #[tokio::test]
    async fn test_fetch_target_hands_back_target_on_failure() {
        let target = FetchTarget::new("https://example.com/down", parent());
        let (returned, err) = fetcher(None).fetch_target(target.clone()).await.unwrap_err();
        assert_eq!(returned, target);
        assert_eq!(err.kind(), FailureKind::Transport);
    }

    #[test]
    fn test_fetch_target_key_is_url() {
        let target = FetchTarget::new("https://example.com/k", parent());
        assert_eq!(target.key(), "https://example.com/k");
    }
}
