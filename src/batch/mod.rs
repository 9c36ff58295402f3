//! Bounded-concurrency batch engine.
//!
//! This module provides the pieces every pipeline stage is built from:
//!
//! - [`ConcurrencyLimiter`] - FIFO counting gate over a Tokio semaphore
//! - [`BatchRunner`] - runs one async operation per item, at most K at a time,
//!   and accounts for every item exactly once
//! - [`run_with_retry`] and [`SweepPolicy`] - bounded retry sweeps over the
//!   failed subset of a batch
//! - [`BatchObserver`] - progress hook for the orchestrator
//!
//! Per-item failures are [`ItemError`] values recorded in outcomes. Only
//! [`EngineError`] aborts a run.

mod error;
mod limiter;
mod observer;
mod outcome;
mod retry;
mod runner;

pub use error::{EngineError, FailureKind, ItemError};
pub use limiter::{
    ConcurrencyLimiter, DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY, SlotPermit,
};
pub use observer::{BatchObserver, NoopObserver};
pub use outcome::{
    AbandonReason, BatchItem, BatchOutcome, BatchParts, BatchReport, BatchStats, OutcomeStatus,
};
pub use retry::{
    DEFAULT_MAX_SWEEPS, RetriedReport, RetryDecision, RetryScope, SweepPolicy, run_with_retry,
};
pub use runner::BatchRunner;
