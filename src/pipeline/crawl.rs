//! Crawl stage: fetch child URLs and merge discovered pages.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::batch::{
    BatchObserver, BatchRunner, BatchStats, EngineError, RetryScope, SweepPolicy, run_with_retry,
};
use crate::config::CrawlConfig;
use crate::document::{Document, merge_documents};
use crate::fetch::{ContentFetcher, FetchTarget, PageSource};

/// Result of a crawl stage.
#[derive(Debug)]
pub struct CrawlReport {
    /// Originals followed by newly discovered documents, deduplicated by id.
    pub documents: Vec<Document>,
    /// Number of input documents.
    pub initial_count: usize,
    /// Number of documents after the merge.
    pub final_count: usize,
    /// Number of child pages fetched successfully.
    pub discovered: usize,
    /// Counters per fetch pass.
    pub passes: Vec<BatchStats>,
    /// True if a pass hit its deadline.
    pub timed_out: bool,
}

impl CrawlReport {
    /// Documents added by this crawl.
    #[must_use]
    pub fn newly_added(&self) -> usize {
        self.final_count.saturating_sub(self.initial_count)
    }

    /// Fetch targets submitted to the first pass.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.passes.first().map_or(0, BatchStats::submitted)
    }
}

/// Fetches every child URL of `documents` and merges the new pages in.
///
/// Each child URL becomes one fetch target linked to the document it came
/// from. All targets run as one batch; failed fetches are logged and left
/// out.
///
/// # Errors
///
/// Returns [`EngineError::EmptyBatch`] for empty input and
/// [`EngineError::InvalidConcurrency`] for an out-of-range concurrency.
#[instrument(skip_all, fields(documents = documents.len(), concurrency = config.concurrency))]
pub async fn run_crawl(
    documents: Vec<Document>,
    config: &CrawlConfig,
    source: Arc<dyn PageSource>,
    observer: Arc<dyn BatchObserver>,
) -> Result<CrawlReport, EngineError> {
    if documents.is_empty() {
        return Err(EngineError::EmptyBatch { stage: "crawl" });
    }

    let runner = BatchRunner::new(config.concurrency)?
        .with_label("crawl")
        .with_deadline(config.deadline())
        .with_observer(observer);
    let policy = SweepPolicy::new(config.pacing(), config.pacing(), config.retry_sweeps)
        .with_scope(RetryScope::TransientOnly);

    let targets: Vec<FetchTarget> = documents
        .iter()
        .flat_map(|document| {
            document
                .child_urls
                .iter()
                .map(|url| FetchTarget::new(url.clone(), document.metadata.clone()))
        })
        .collect();

    let initial_count = documents.len();
    info!(initial_count, targets = targets.len(), "starting crawl");

    let fetcher = ContentFetcher::new(source, config.request_timeout());
    let outcome = run_with_retry(&runner, &policy, targets, move |target: FetchTarget| {
        let fetcher = fetcher.clone();
        async move { fetcher.fetch_target(target).await }
    })
    .await?;

    let discovered: Vec<Document> = outcome.successes.into_iter().map(|(_, doc)| doc).collect();
    let discovered_count = discovered.len();
    let merged = merge_documents(documents, discovered);

    let report = CrawlReport {
        final_count: merged.len(),
        documents: merged,
        initial_count,
        discovered: discovered_count,
        passes: outcome.passes,
        timed_out: outcome.timed_out,
    };
    info!(
        initial_count = report.initial_count,
        final_count = report.final_count,
        newly_added = report.newly_added(),
        failed = outcome.failures.len(),
        abandoned = outcome.abandoned.len(),
        "crawl complete"
    );
    Ok(report)
}
