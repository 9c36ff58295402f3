//! Retry sweeps over the failed subset of a batch.
//!
//! A sweep re-runs the [`BatchRunner`] over only the items whose outcome was a
//! recorded failure. Successes are never re-run and abandoned items are not
//! retried. Sweeps are bounded by [`SweepPolicy::max_sweeps`], and each sweep
//! paces more slowly than the last to ride out provider rate limits.
//!
//! # Pacing
//!
//! ```text
//! sweep 0 (first pass): first_pass_pacing
//! sweep n >= 1:         min(retry_pacing * multiplier^(n-1), max_pacing)
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, instrument};

use super::{AbandonReason, BatchItem, BatchRunner, BatchStats, EngineError, FailureKind, ItemError};

/// Default retry sweep count.
pub const DEFAULT_MAX_SWEEPS: u32 = 1;

/// Default pacing multiplier between retry sweeps.
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Default cap on retry pacing.
const DEFAULT_MAX_PACING: Duration = Duration::from_secs(120);

/// Which failures a retry sweep picks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryScope {
    /// Retry every recorded failure, whatever its kind.
    #[default]
    AllFailures,
    /// Retry only transport and resource-exhaustion failures.
    TransientOnly,
}

impl RetryScope {
    /// Returns true if failures of `kind` are retried under this scope.
    #[must_use]
    pub fn covers(self, kind: FailureKind) -> bool {
        match self {
            Self::AllFailures => true,
            Self::TransientOnly => kind.is_transient(),
        }
    }
}

/// Decision on whether to run another sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Run another sweep with the given pacing.
    Retry {
        /// Pause applied after each operation in the sweep.
        pacing: Duration,
        /// Sweep number (1 for the first retry).
        sweep: u32,
    },

    /// Stop sweeping.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Timing and bounds for the first pass and its retry sweeps.
#[derive(Debug, Clone)]
pub struct SweepPolicy {
    first_pass_pacing: Duration,
    retry_pacing: Duration,
    max_sweeps: u32,
    backoff_multiplier: f32,
    max_pacing: Duration,
    scope: RetryScope,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            first_pass_pacing: Duration::ZERO,
            retry_pacing: Duration::from_secs(1),
            max_sweeps: DEFAULT_MAX_SWEEPS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_pacing: DEFAULT_MAX_PACING,
            scope: RetryScope::AllFailures,
        }
    }
}

impl SweepPolicy {
    /// Creates a policy retrying all failures with default backoff settings.
    #[must_use]
    pub fn new(first_pass_pacing: Duration, retry_pacing: Duration, max_sweeps: u32) -> Self {
        Self {
            first_pass_pacing,
            retry_pacing,
            max_sweeps,
            ..Self::default()
        }
    }

    /// Sets which failures are retried.
    #[must_use]
    pub fn with_scope(mut self, scope: RetryScope) -> Self {
        self.scope = scope;
        self
    }

    /// Sets pacing growth between sweeps and its cap.
    #[must_use]
    pub fn with_backoff(mut self, multiplier: f32, max_pacing: Duration) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self.max_pacing = max_pacing;
        self
    }

    /// Maximum number of retry sweeps after the first pass.
    #[must_use]
    pub fn max_sweeps(&self) -> u32 {
        self.max_sweeps
    }

    /// Retry scope.
    #[must_use]
    pub fn scope(&self) -> RetryScope {
        self.scope
    }

    /// Pacing for sweep `sweep` (0 is the first pass).
    #[must_use]
    pub fn pacing_for_sweep(&self, sweep: u32) -> Duration {
        if sweep == 0 {
            return self.first_pass_pacing;
        }
        let exponent = i32::try_from(sweep - 1).unwrap_or(i32::MAX);
        let factor = f64::from(self.backoff_multiplier).powi(exponent);
        let scaled = self.retry_pacing.as_secs_f64() * factor;
        // Capping keeps this finite even when the factor overflows to infinity.
        let capped = scaled.min(self.max_pacing.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Decides whether to run another sweep after `completed_sweep`.
    ///
    /// `retryable` is the number of in-scope failures left by that sweep.
    #[instrument(level = "debug", skip(self), fields(max_sweeps = self.max_sweeps))]
    pub fn should_retry(&self, completed_sweep: u32, retryable: usize) -> RetryDecision {
        if retryable == 0 {
            return RetryDecision::DoNotRetry {
                reason: "no retryable failures".to_string(),
            };
        }
        if completed_sweep >= self.max_sweeps {
            return RetryDecision::DoNotRetry {
                reason: format!("retry sweeps exhausted ({})", self.max_sweeps),
            };
        }
        let sweep = completed_sweep + 1;
        RetryDecision::Retry {
            pacing: self.pacing_for_sweep(sweep),
            sweep,
        }
    }
}

/// Combined result of a first pass and its retry sweeps.
#[derive(Debug)]
pub struct RetriedReport<I, T> {
    /// `(key, value)` for every item that eventually succeeded.
    pub successes: Vec<(String, T)>,
    /// Failures left after the last sweep, including out-of-scope ones.
    pub failures: Vec<(String, I, ItemError)>,
    /// Items that never completed.
    pub abandoned: Vec<(String, AbandonReason)>,
    /// Counters for each pass, first pass first.
    pub passes: Vec<BatchStats>,
    /// True if any pass hit its deadline.
    pub timed_out: bool,
}

impl<I, T> RetriedReport<I, T> {
    /// Number of items that were submitted to the first pass.
    #[must_use]
    pub fn submitted(&self) -> usize {
        self.passes.first().map_or(0, BatchStats::submitted)
    }
}

/// Runs `op` over `items`, then re-runs it over in-scope failures.
///
/// Each pass uses `runner`'s concurrency, deadline and observer with the
/// pacing from `policy`. A pass that hits its deadline ends sweeping.
///
/// # Errors
///
/// Propagates [`EngineError`] from the runner.
#[instrument(skip_all, fields(label = %runner.label(), items = items.len()))]
pub async fn run_with_retry<I, T, F, Fut>(
    runner: &BatchRunner,
    policy: &SweepPolicy,
    items: Vec<I>,
    op: F,
) -> Result<RetriedReport<I, T>, EngineError>
where
    I: BatchItem,
    T: Send + 'static,
    F: Fn(I) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<T, (I, ItemError)>> + Send + 'static,
{
    let mut report = RetriedReport {
        successes: Vec::new(),
        failures: Vec::new(),
        abandoned: Vec::new(),
        passes: Vec::new(),
        timed_out: false,
    };
    let mut pending = items;
    let mut sweep = 0;
    let mut pacing = policy.pacing_for_sweep(0);

    loop {
        let label = if sweep == 0 {
            runner.label().to_string()
        } else {
            format!("{} retry {sweep}", runner.label())
        };
        let pass = runner.clone().with_pacing(pacing).with_label(label);
        let batch = pass.run(pending, op.clone()).await?;

        report.passes.push(batch.stats.clone());
        let timed_out = batch.timed_out;
        report.timed_out |= timed_out;

        let parts = batch.into_parts();
        report.successes.extend(parts.successes);
        report.abandoned.extend(parts.abandoned);

        let (retryable, terminal): (Vec<_>, Vec<_>) = parts
            .failures
            .into_iter()
            .partition(|(_, _, error)| policy.scope().covers(error.kind()));
        report.failures.extend(terminal);

        if timed_out {
            report.failures.extend(retryable);
            break;
        }

        match policy.should_retry(sweep, retryable.len()) {
            RetryDecision::Retry {
                pacing: next_pacing,
                sweep: next_sweep,
            } => {
                info!(
                    sweep = next_sweep,
                    retrying = retryable.len(),
                    pacing_ms = next_pacing.as_millis(),
                    "starting retry sweep"
                );
                pending = retryable.into_iter().map(|(_, item, _)| item).collect();
                pacing = next_pacing;
                sweep = next_sweep;
            }
            RetryDecision::DoNotRetry { reason } => {
                debug!(%reason, remaining = retryable.len(), "not retrying");
                report.failures.extend(retryable);
                break;
            }
        }
    }

    info!(
        succeeded = report.successes.len(),
        failed = report.failures.len(),
        abandoned = report.abandoned.len(),
        passes = report.passes.len(),
        "batch with retries complete"
    );
    Ok(report)
}
