//! Per-item outcomes and batch counters.

use std::fmt;

use super::{FailureKind, ItemError};

/// An item the batch runner can process.
///
/// The key identifies the item in logs and outcomes. It does not need to be
/// unique, but unique keys make failures traceable.
pub trait BatchItem: Send + 'static {
    /// Identity used for traceability.
    fn key(&self) -> String;
}

impl BatchItem for String {
    fn key(&self) -> String {
        self.clone()
    }
}

/// Why an item was given up on without a result or a recorded failure cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// The batch deadline elapsed before the item finished.
    DeadlineElapsed,
    /// The operation panicked.
    Panicked,
}

impl fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeadlineElapsed => f.write_str("deadline elapsed"),
            Self::Panicked => f.write_str("operation panicked"),
        }
    }
}

/// Exactly one of these is produced for every submitted item.
#[derive(Debug)]
pub enum BatchOutcome<I, T> {
    /// The operation returned a value.
    Success {
        /// Item key.
        key: String,
        /// Produced value.
        value: T,
    },
    /// The operation failed; the item is handed back for a later pass.
    Failure {
        /// Item key.
        key: String,
        /// The item that failed.
        item: I,
        /// Cause.
        error: ItemError,
    },
    /// The operation never completed.
    Abandoned {
        /// Item key.
        key: String,
        /// Cause.
        reason: AbandonReason,
    },
}

impl<I, T> BatchOutcome<I, T> {
    /// Item key.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Success { key, .. } | Self::Failure { key, .. } | Self::Abandoned { key, .. } => {
                key
            }
        }
    }

    /// Compact status without the payload.
    #[must_use]
    pub fn status(&self) -> OutcomeStatus {
        match self {
            Self::Success { .. } => OutcomeStatus::Succeeded,
            Self::Failure { error, .. } => OutcomeStatus::Failed(error.kind()),
            Self::Abandoned { reason, .. } => OutcomeStatus::Abandoned(*reason),
        }
    }

    /// Returns true for [`BatchOutcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Payload-free view of an outcome, passed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// Produced a value.
    Succeeded,
    /// Failed with a classified error.
    Failed(FailureKind),
    /// Never completed.
    Abandoned(AbandonReason),
}

/// Aggregate counters for one batch run.
///
/// `submitted == succeeded + failed + abandoned` once the run has returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    submitted: usize,
    succeeded: usize,
    failed: usize,
    abandoned: usize,
    failures_by_kind: [usize; 4],
}

impl BatchStats {
    pub(crate) fn new(submitted: usize) -> Self {
        Self {
            submitted,
            ..Self::default()
        }
    }

    pub(crate) fn record(&mut self, status: OutcomeStatus) {
        match status {
            OutcomeStatus::Succeeded => self.succeeded += 1,
            OutcomeStatus::Failed(kind) => {
                self.failed += 1;
                self.failures_by_kind[kind.index()] += 1;
            }
            OutcomeStatus::Abandoned(_) => self.abandoned += 1,
        }
    }

    /// Number of items submitted.
    #[must_use]
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Number of items that produced a value.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Number of items that failed with a recorded cause.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Number of items abandoned (deadline or panic).
    #[must_use]
    pub fn abandoned(&self) -> usize {
        self.abandoned
    }

    /// Number of failures of one kind.
    #[must_use]
    pub fn failures_of(&self, kind: FailureKind) -> usize {
        self.failures_by_kind[kind.index()]
    }

    /// Items accounted for so far.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.abandoned
    }
}

/// Result of one [`BatchRunner::run`](super::BatchRunner::run).
#[derive(Debug)]
pub struct BatchReport<I, T> {
    /// One outcome per submitted item, in completion order.
    pub outcomes: Vec<BatchOutcome<I, T>>,
    /// Counters for this run.
    pub stats: BatchStats,
    /// True if the batch deadline cut the run short.
    pub timed_out: bool,
}

impl<I, T> BatchReport<I, T> {
    /// Splits outcomes by variant.
    #[must_use]
    pub fn into_parts(self) -> BatchParts<I, T> {
        let mut parts = BatchParts {
            successes: Vec::new(),
            failures: Vec::new(),
            abandoned: Vec::new(),
        };
        for outcome in self.outcomes {
            match outcome {
                BatchOutcome::Success { key, value } => parts.successes.push((key, value)),
                BatchOutcome::Failure { key, item, error } => {
                    parts.failures.push((key, item, error));
                }
                BatchOutcome::Abandoned { key, reason } => parts.abandoned.push((key, reason)),
            }
        }
        parts
    }
}

/// Outcomes of a report grouped by variant.
#[derive(Debug)]
pub struct BatchParts<I, T> {
    /// `(key, value)` pairs.
    pub successes: Vec<(String, T)>,
    /// `(key, item, error)` triples.
    pub failures: Vec<(String, I, ItemError)>,
    /// `(key, reason)` pairs.
    pub abandoned: Vec<(String, AbandonReason)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_record_each_status() {
        let mut stats = BatchStats::new(4);
        stats.record(OutcomeStatus::Succeeded);
        stats.record(OutcomeStatus::Failed(FailureKind::Parse));
        stats.record(OutcomeStatus::Failed(FailureKind::Parse));
        stats.record(OutcomeStatus::Abandoned(AbandonReason::Panicked));

        assert_eq!(stats.submitted(), 4);
        assert_eq!(stats.succeeded(), 1);
        assert_eq!(stats.failed(), 2);
        assert_eq!(stats.abandoned(), 1);
        assert_eq!(stats.failures_of(FailureKind::Parse), 2);
        assert_eq!(stats.failures_of(FailureKind::Transport), 0);
        assert_eq!(stats.total(), 4);
    }

    #[test]
    fn test_outcome_status_and_key() {
        let ok: BatchOutcome<String, u32> = BatchOutcome::Success {
            key: "a".into(),
            value: 1,
        };
        let failed: BatchOutcome<String, u32> = BatchOutcome::Failure {
            key: "b".into(),
            item: "b".into(),
            error: ItemError::empty("nothing"),
        };
        assert_eq!(ok.key(), "a");
        assert!(ok.is_success());
        assert_eq!(
            failed.status(),
            OutcomeStatus::Failed(FailureKind::EmptyResult)
        );
    }

    #[test]
    fn test_report_into_parts() {
        let report: BatchReport<String, u32> = BatchReport {
            outcomes: vec![
                BatchOutcome::Success {
                    key: "a".into(),
                    value: 7,
                },
                BatchOutcome::Abandoned {
                    key: "c".into(),
                    reason: AbandonReason::DeadlineElapsed,
                },
            ],
            stats: BatchStats::new(2),
            timed_out: true,
        };
        let parts = report.into_parts();
        assert_eq!(parts.successes, [("a".to_string(), 7)]);
        assert!(parts.failures.is_empty());
        assert_eq!(parts.abandoned[0].1, AbandonReason::DeadlineElapsed);
    }
}
