//! Generic bounded-concurrency batch driver.
//!
//! The [`BatchRunner`] applies one async operation to every item of a batch.
//! Each item runs in its own Tokio task behind a [`ConcurrencyLimiter`] slot,
//! and completions are consumed from a [`JoinSet`] in the order they finish.
//!
//! # Guarantees
//!
//! - Every submitted item yields exactly one [`BatchOutcome`].
//! - At most `concurrency` operations hold a slot at any instant.
//! - A failing or panicking operation never cancels its siblings.
//! - When a deadline is set and elapses, unfinished tasks are aborted and
//!   recorded as [`AbandonReason::DeadlineElapsed`].
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::batch::{BatchRunner, ItemError};
//!
//! # async fn example() -> Result<(), harvester_core::batch::EngineError> {
//! let runner = BatchRunner::new(4)?.with_label("lengths");
//! let urls = vec!["https://a.example".to_string(), String::new()];
//! let report = runner
//!     .run(urls, |url: String| async move {
//!         if url.is_empty() {
//!             Err((url, ItemError::empty("blank url")))
//!         } else {
//!             Ok(url.len())
//!         }
//!     })
//!     .await?;
//! assert_eq!(report.outcomes.len(), 2);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::{
    AbandonReason, BatchItem, BatchObserver, BatchOutcome, BatchReport, BatchStats,
    ConcurrencyLimiter, EngineError, ItemError, NoopObserver,
};

/// `None` means the operation panicked.
type TaskOutput<I, T> = (usize, Option<Result<T, (I, ItemError)>>);

/// Runs async operations over a batch of items under a concurrency cap.
///
/// The runner itself holds only settings. Each [`run`](Self::run) creates a
/// fresh [`ConcurrencyLimiter`], so runs never share slots.
#[derive(Clone)]
pub struct BatchRunner {
    concurrency: usize,
    pacing: Duration,
    deadline: Option<Duration>,
    label: String,
    observer: Arc<dyn BatchObserver>,
}

impl fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchRunner")
            .field("concurrency", &self.concurrency)
            .field("pacing", &self.pacing)
            .field("deadline", &self.deadline)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl BatchRunner {
    /// Creates a runner with the given concurrency limit.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if `concurrency` is outside
    /// 1..=100.
    pub fn new(concurrency: usize) -> Result<Self, EngineError> {
        // Validate eagerly so misconfiguration surfaces before any work starts.
        ConcurrencyLimiter::new(concurrency)?;
        Ok(Self {
            concurrency,
            pacing: Duration::ZERO,
            deadline: None,
            label: "batch".to_string(),
            observer: Arc::new(NoopObserver),
        })
    }

    /// Pause taken after each operation while its slot is still held.
    #[must_use]
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Wall-clock budget for a whole run.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Name used in logs and observer calls.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Progress observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Configured pacing pause.
    #[must_use]
    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    /// Configured label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs `op` over every item and collects one outcome per item.
    ///
    /// `op` hands the item back together with the error on failure so the
    /// caller can retry it later.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] only if the runner was built
    /// with an invalid limit. Individual item failures never produce an error.
    #[instrument(skip(self, items, op), fields(label = %self.label, concurrency = self.concurrency))]
    pub async fn run<I, T, F, Fut>(
        &self,
        items: Vec<I>,
        op: F,
    ) -> Result<BatchReport<I, T>, EngineError>
    where
        I: BatchItem,
        T: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, (I, ItemError)>> + Send + 'static,
    {
        let limiter = ConcurrencyLimiter::new(self.concurrency)?;
        let total = items.len();
        let op = Arc::new(op);
        let deadline = self.deadline.map(|budget| Instant::now() + budget);

        info!(total, pacing_ms = self.pacing.as_millis(), "starting batch");
        self.observer.batch_started(&self.label, total);

        let mut keys: Vec<Option<String>> = Vec::with_capacity(total);
        let mut tasks: JoinSet<TaskOutput<I, T>> = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            keys.push(Some(item.key()));
            let limiter = limiter.clone();
            let op = Arc::clone(&op);
            let pacing = self.pacing;

            tasks.spawn(async move {
                let permit = match limiter.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        let error = ItemError::exhausted(e.to_string());
                        return (index, Some(Err((item, error))));
                    }
                };

                let result = AssertUnwindSafe(async move { op(item).await })
                    .catch_unwind()
                    .await
                    .ok();

                if !pacing.is_zero() {
                    tokio::time::sleep(pacing).await;
                }
                permit.release();
                (index, result)
            });
        }

        let mut stats = BatchStats::new(total);
        let mut outcomes = Vec::with_capacity(total);
        let mut timed_out = false;

        loop {
            let joined = match deadline {
                Some(at) => {
                    if let Ok(next) = tokio::time::timeout_at(at, tasks.join_next()).await {
                        next
                    } else {
                        timed_out = true;
                        break;
                    }
                }
                None => tasks.join_next().await,
            };
            let Some(joined) = joined else {
                break;
            };
            match joined {
                Ok(output) => self.finish(output, &mut keys, &mut stats, &mut outcomes),
                Err(e) => warn!(label = %self.label, error = %e, "batch task ended without output"),
            }
        }

        if timed_out {
            warn!(
                label = %self.label,
                unfinished = tasks.len(),
                "batch deadline elapsed, aborting unfinished items"
            );
            tasks.abort_all();
            // Tasks that completed before the abort landed still count.
            while let Some(joined) = tasks.join_next().await {
                if let Ok(output) = joined {
                    self.finish(output, &mut keys, &mut stats, &mut outcomes);
                }
            }
        }

        let reason = if timed_out {
            AbandonReason::DeadlineElapsed
        } else {
            AbandonReason::Panicked
        };
        for key in keys.into_iter().flatten() {
            self.record(
                BatchOutcome::Abandoned { key, reason },
                &mut stats,
                &mut outcomes,
            );
        }

        info!(
            submitted = stats.submitted(),
            succeeded = stats.succeeded(),
            failed = stats.failed(),
            abandoned = stats.abandoned(),
            timed_out,
            "batch complete"
        );
        self.observer.batch_finished(&self.label, &stats);

        Ok(BatchReport {
            outcomes,
            stats,
            timed_out,
        })
    }

    fn finish<I, T>(
        &self,
        (index, result): TaskOutput<I, T>,
        keys: &mut [Option<String>],
        stats: &mut BatchStats,
        outcomes: &mut Vec<BatchOutcome<I, T>>,
    ) {
        let key = keys.get_mut(index).and_then(Option::take).unwrap_or_default();
        let outcome = match result {
            Some(Ok(value)) => {
                debug!(label = %self.label, key = %key, "item succeeded");
                BatchOutcome::Success { key, value }
            }
            Some(Err((item, error))) => {
                warn!(
                    label = %self.label,
                    key = %key,
                    kind = %error.kind(),
                    error = %error,
                    "item failed"
                );
                BatchOutcome::Failure { key, item, error }
            }
            None => {
                warn!(label = %self.label, key = %key, "item operation panicked");
                BatchOutcome::Abandoned {
                    key,
                    reason: AbandonReason::Panicked,
                }
            }
        };
        self.record(outcome, stats, outcomes);
    }

    fn record<I, T>(
        &self,
        outcome: BatchOutcome<I, T>,
        stats: &mut BatchStats,
        outcomes: &mut Vec<BatchOutcome<I, T>>,
    ) {
        let status = outcome.status();
        stats.record(status);
        self.observer.item_finished(&self.label, outcome.key(), status);
        outcomes.push(outcome);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::batch::{FailureKind, OutcomeStatus};

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("item-{i}")).collect()
    }

    #[test]
    fn test_runner_new_rejects_invalid_concurrency() {
        assert!(matches!(
            BatchRunner::new(0),
            Err(EngineError::InvalidConcurrency { value: 0 })
        ));
        assert!(BatchRunner::new(100).is_ok());
    }

    #[tokio::test]
    async fn test_run_empty_batch_returns_empty_report() {
        let runner = BatchRunner::new(3).unwrap();
        let report = runner
            .run(Vec::<String>::new(), |item: String| async move {
                Ok::<_, (String, ItemError)>(item)
            })
            .await
            .unwrap();
        assert!(report.outcomes.is_empty());
        assert_eq!(report.stats.submitted(), 0);
        assert!(!report.timed_out);
    }

    #[tokio::test]
    async fn test_run_records_failures_without_cancelling_siblings() {
        let runner = BatchRunner::new(2).unwrap();
        let report = runner
            .run(keys(6), |item: String| async move {
                if item.ends_with('3') {
                    Err((item, ItemError::transport("connection reset")))
                } else {
                    Ok(item.len())
                }
            })
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 6);
        assert_eq!(report.stats.succeeded(), 5);
        assert_eq!(report.stats.failed(), 1);
        assert_eq!(report.stats.failures_of(FailureKind::Transport), 1);

        let parts = report.into_parts();
        assert_eq!(parts.failures.len(), 1);
        assert_eq!(parts.failures[0].0, "item-3");
        assert_eq!(parts.failures[0].1, "item-3");
    }

    #[tokio::test]
    async fn test_run_never_exceeds_concurrency() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let runner = BatchRunner::new(3).unwrap();

        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
        let report = runner
            .run(keys(20), move |item: String| {
                let (active, peak) = (Arc::clone(&a), Arc::clone(&p));
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, (String, ItemError)>(item)
                }
            })
            .await
            .unwrap();

        assert_eq!(report.stats.succeeded(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_run_panicking_item_is_abandoned() {
        let runner = BatchRunner::new(2).unwrap();
        let report = runner
            .run(keys(3), |item: String| async move {
                assert!(item != "item-1", "boom");
                Ok::<_, (String, ItemError)>(())
            })
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.stats.succeeded(), 2);
        assert_eq!(report.stats.abandoned(), 1);
        let parts = report.into_parts();
        assert_eq!(
            parts.abandoned,
            [("item-1".to_string(), AbandonReason::Panicked)]
        );
    }

    #[tokio::test]
    async fn test_run_deadline_abandons_unfinished_items() {
        let runner = BatchRunner::new(4)
            .unwrap()
            .with_deadline(Some(Duration::from_millis(100)));
        let report = runner
            .run(keys(4), |item: String| async move {
                if item == "item-0" {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                Ok::<_, (String, ItemError)>(())
            })
            .await
            .unwrap();

        assert!(report.timed_out);
        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.stats.succeeded(), 3);
        assert_eq!(report.stats.abandoned(), 1);
        let parts = report.into_parts();
        assert_eq!(
            parts.abandoned,
            [("item-0".to_string(), AbandonReason::DeadlineElapsed)]
        );
    }

    #[tokio::test]
    async fn test_pacing_holds_slot() {
        let runner = BatchRunner::new(1)
            .unwrap()
            .with_pacing(Duration::from_millis(40));
        let started = Instant::now();
        runner
            .run(keys(3), |item: String| async move {
                Ok::<_, (String, ItemError)>(item)
            })
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(120));
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl BatchObserver for Recorder {
        fn batch_started(&self, label: &str, total: usize) {
            self.events.lock().unwrap().push(format!("start {label} {total}"));
        }

        fn item_finished(&self, _label: &str, key: &str, status: OutcomeStatus) {
            self.events.lock().unwrap().push(format!("{key} {status:?}"));
        }

        fn batch_finished(&self, label: &str, stats: &BatchStats) {
            self.events
                .lock()
                .unwrap()
                .push(format!("end {label} {}", stats.total()));
        }
    }

    #[tokio::test]
    async fn test_observer_sees_every_completion() {
        let recorder = Arc::new(Recorder::default());
        let runner = BatchRunner::new(2)
            .unwrap()
            .with_label("observed")
            .with_observer(recorder.clone());
        runner
            .run(keys(2), |item: String| async move {
                Err::<(), _>((item, ItemError::parse("bad")))
            })
            .await
            .unwrap();

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], "start observed 2");
        assert!(events[1].contains("Failed(Parse)"));
        assert_eq!(events[3], "end observed 2");
    }
}
