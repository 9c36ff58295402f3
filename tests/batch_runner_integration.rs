//! Integration tests for the batch runner and retry sweeps.
//!
//! These drive the public engine API with synthetic operations to check the
//! concurrency bound, failure isolation and sweep behavior end to end.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use harvester_core::batch::{AbandonReason, BatchOutcome, RetryScope};
use harvester_core::{
    BatchRunner, EngineError, FailureKind, ItemError, SweepPolicy, run_with_retry,
};

fn keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("item-{i:02}")).collect()
}

/// Tracks how many operations run at once.
#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_fifty_items_never_exceed_limit() {
    let gauge = Arc::new(Gauge::default());
    let runner = BatchRunner::new(4).unwrap();

    let op_gauge = Arc::clone(&gauge);
    let report = runner
        .run(keys(50), move |key: String| {
            let gauge = Arc::clone(&op_gauge);
            async move {
                gauge.enter();
                tokio::time::sleep(Duration::from_millis(5)).await;
                gauge.exit();
                Ok::<_, (String, ItemError)>(key.len())
            }
        })
        .await
        .unwrap();

    assert_eq!(report.stats.submitted(), 50);
    assert_eq!(report.stats.succeeded(), 50);
    assert_eq!(report.outcomes.len(), 50);
    let peak = gauge.peak.load(Ordering::SeqCst);
    assert!(peak <= 4, "peak concurrency {peak} exceeded limit");
    assert!(peak >= 2, "expected some overlap, peak was {peak}");
}

#[tokio::test]
async fn test_single_slot_runs_items_one_at_a_time() {
    let gauge = Arc::new(Gauge::default());
    let runner = BatchRunner::new(1).unwrap();

    let op_gauge = Arc::clone(&gauge);
    let report = runner
        .run(keys(6), move |key: String| {
            let gauge = Arc::clone(&op_gauge);
            async move {
                gauge.enter();
                tokio::task::yield_now().await;
                gauge.exit();
                Ok::<_, (String, ItemError)>(key)
            }
        })
        .await
        .unwrap();

    assert_eq!(report.stats.succeeded(), 6);
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mixed_failures_are_counted_by_kind() {
    let runner = BatchRunner::new(3).unwrap();
    let report = runner
        .run(keys(8), |key: String| async move {
            let n: usize = key[5..].parse().unwrap();
            match n % 4 {
                0 => Err((key, ItemError::transport("connection reset"))),
                1 => Err((key, ItemError::parse("not json"))),
                _ => Ok(n),
            }
        })
        .await
        .unwrap();

    assert_eq!(report.stats.submitted(), 8);
    assert_eq!(report.stats.succeeded(), 4);
    assert_eq!(report.stats.failed(), 4);
    assert_eq!(report.stats.failures_of(FailureKind::Transport), 2);
    assert_eq!(report.stats.failures_of(FailureKind::Parse), 2);

    let parts = report.into_parts();
    let mut failed: Vec<_> = parts.failures.iter().map(|(key, _, _)| key.clone()).collect();
    failed.sort();
    assert_eq!(failed, ["item-00", "item-01", "item-04", "item-05"]);
}

#[tokio::test]
async fn test_outcomes_follow_completion_order() {
    let runner = BatchRunner::new(3).unwrap();
    let items = vec!["slow".to_string(), "medium".to_string(), "fast".to_string()];

    let report = runner
        .run(items, |key: String| async move {
            let delay = match key.as_str() {
                "slow" => 120,
                "medium" => 60,
                _ => 0,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok::<_, (String, ItemError)>(())
        })
        .await
        .unwrap();

    let order: Vec<&str> = report.outcomes.iter().map(BatchOutcome::key).collect();
    assert_eq!(order, ["fast", "medium", "slow"]);
}

#[tokio::test]
async fn test_deadline_abandons_stragglers_and_keeps_finished() {
    let runner = BatchRunner::new(2)
        .unwrap()
        .with_deadline(Some(Duration::from_millis(100)));
    let items = vec!["quick".to_string(), "stuck".to_string()];

    let report = runner
        .run(items, |key: String| async move {
            if key == "stuck" {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok::<_, (String, ItemError)>(())
        })
        .await
        .unwrap();

    assert!(report.timed_out);
    assert_eq!(report.stats.succeeded(), 1);
    assert_eq!(report.stats.abandoned(), 1);
    let parts = report.into_parts();
    assert_eq!(
        parts.abandoned,
        [("stuck".to_string(), AbandonReason::DeadlineElapsed)]
    );
}

#[test]
fn test_invalid_concurrency_is_rejected_up_front() {
    assert!(matches!(
        BatchRunner::new(0),
        Err(EngineError::InvalidConcurrency { value: 0 })
    ));
    assert!(matches!(
        BatchRunner::new(101),
        Err(EngineError::InvalidConcurrency { value: 101 })
    ));
}

#[tokio::test]
async fn test_retry_sweep_recovers_first_pass_failures() {
    let attempts: Arc<Mutex<HashMap<String, usize>>> = Arc::default();
    let runner = BatchRunner::new(5).unwrap().with_label("flaky");
    let policy = SweepPolicy::new(Duration::ZERO, Duration::ZERO, 1);

    let op_attempts = Arc::clone(&attempts);
    let report = run_with_retry(&runner, &policy, keys(10), move |key: String| {
        let attempts = Arc::clone(&op_attempts);
        async move {
            let attempt = {
                let mut map = attempts.lock().unwrap();
                let count = map.entry(key.clone()).or_insert(0);
                *count += 1;
                *count
            };
            // Odd items fail the first time only.
            let n: usize = key[5..].parse().unwrap();
            if n % 2 == 1 && attempt == 1 {
                Err((key, ItemError::empty("no text")))
            } else {
                Ok(n)
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(report.submitted(), 10);
    assert_eq!(report.successes.len(), 10);
    assert!(report.failures.is_empty());
    assert_eq!(report.passes.len(), 2);
    assert_eq!(report.passes[0].failed(), 5);
    assert_eq!(report.passes[1].submitted(), 5);
    assert_eq!(report.passes[1].failed(), 0);
}

#[tokio::test]
async fn test_transient_scope_leaves_permanent_failures_alone() {
    let calls = Arc::new(AtomicUsize::new(0));
    let runner = BatchRunner::new(2).unwrap();
    let policy =
        SweepPolicy::new(Duration::ZERO, Duration::ZERO, 3).with_scope(RetryScope::TransientOnly);

    let op_calls = Arc::clone(&calls);
    let report = run_with_retry(&runner, &policy, vec!["broken".to_string()], move |key: String| {
        op_calls.fetch_add(1, Ordering::SeqCst);
        async move { Err::<(), _>((key, ItemError::parse("malformed"))) }
    })
    .await
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.passes.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].2.kind(), FailureKind::Parse);
}

#[tokio::test]
async fn test_sweeps_stop_at_configured_limit() {
    let calls = Arc::new(AtomicUsize::new(0));
    let runner = BatchRunner::new(1).unwrap();
    let policy = SweepPolicy::new(Duration::ZERO, Duration::ZERO, 2);

    let op_calls = Arc::clone(&calls);
    let report = run_with_retry(&runner, &policy, vec!["down".to_string()], move |key: String| {
        op_calls.fetch_add(1, Ordering::SeqCst);
        async move { Err::<(), _>((key, ItemError::transport("503"))) }
    })
    .await
    .unwrap();

    // First pass plus two sweeps.
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.passes.len(), 3);
    assert_eq!(report.failures.len(), 1);
    assert!(report.successes.is_empty());
}
