//! Error types for the batch engine.
//!
//! [`EngineError`] covers caller mistakes and engine faults that abort a run.
//! [`ItemError`] covers a single item's failure; it is recorded in the item's
//! outcome and never aborts the batch.

use std::fmt;

use thiserror::Error;

use super::limiter::{MAX_CONCURRENCY, MIN_CONCURRENCY};

/// Errors that abort a batch or stage.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// A stage entry point received no documents.
    #[error("{stage} requires at least one document")]
    EmptyBatch {
        /// Stage that rejected the input.
        stage: &'static str,
    },

    /// The limiter's semaphore was closed unexpectedly.
    #[error("concurrency limiter closed unexpectedly")]
    LimiterClosed,
}

/// Classification of a per-item failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Network or API error.
    Transport,
    /// The call succeeded but returned no usable payload.
    EmptyResult,
    /// A payload was present but could not be decoded.
    Parse,
    /// A hard resource cap was hit.
    ResourceExhaustion,
}

impl FailureKind {
    /// All kinds, in reporting order.
    pub const ALL: [Self; 4] = [
        Self::Transport,
        Self::EmptyResult,
        Self::Parse,
        Self::ResourceExhaustion,
    ];

    /// Stable label used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::EmptyResult => "empty_result",
            Self::Parse => "parse",
            Self::ResourceExhaustion => "resource_exhaustion",
        }
    }

    /// Returns true for failures that may succeed on a later attempt.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Transport | Self::ResourceExhaustion)
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Transport => 0,
            Self::EmptyResult => 1,
            Self::Parse => 2,
            Self::ResourceExhaustion => 3,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single item produced no result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ItemError {
    /// Network or API failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The call succeeded but there was nothing to use.
    #[error("empty result: {0}")]
    EmptyResult(String),

    /// The payload could not be decoded into the expected shape.
    #[error("parse failure: {0}")]
    Parse(String),

    /// A resource cap was exceeded.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

impl ItemError {
    /// Creates a transport failure.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates an empty-result failure.
    pub fn empty(message: impl Into<String>) -> Self {
        Self::EmptyResult(message.into())
    }

    /// Creates a parse failure.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Creates a resource-exhaustion failure.
    pub fn exhausted(message: impl Into<String>) -> Self {
        Self::ResourceExhausted(message.into())
    }

    /// Returns the failure classification.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(_) => FailureKind::Transport,
            Self::EmptyResult(_) => FailureKind::EmptyResult,
            Self::Parse(_) => FailureKind::Parse,
            Self::ResourceExhausted(_) => FailureKind::ResourceExhaustion,
        }
    }
}
