//! Progress hook supplied by the orchestrator.

use super::{BatchStats, OutcomeStatus};

/// Receives progress notifications from a batch run.
///
/// Calls arrive from the runner's collection loop, one at a time, in
/// completion order. Implementations must be cheap; they run between
/// completions.
pub trait BatchObserver: Send + Sync {
    /// Called once before any item starts.
    fn batch_started(&self, _label: &str, _total: usize) {}

    /// Called as each item completes.
    fn item_finished(&self, _label: &str, _key: &str, _status: OutcomeStatus) {}

    /// Called once after every item is accounted for.
    fn batch_finished(&self, _label: &str, _stats: &BatchStats) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl BatchObserver for NoopObserver {}
