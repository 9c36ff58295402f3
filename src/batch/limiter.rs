//! Counting admission gate bounding in-flight operations.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use super::EngineError;

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Bounds the number of simultaneously held slots to a fixed capacity.
///
/// Backed by a Tokio semaphore, which queues waiters in FIFO order, so no
/// waiter starves while total work is bounded. Cloning shares the same slots.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyLimiter {
    /// Creates a limiter with `capacity` slots.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if `capacity` is outside
    /// 1..=100.
    pub fn new(capacity: usize) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&capacity) {
            return Err(EngineError::InvalidConcurrency { value: capacity });
        }
        debug!(capacity, "creating concurrency limiter");
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Waits for a free slot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::LimiterClosed`] if the semaphore was closed. The
    /// limiter never closes it, so this only signals a bug.
    pub async fn acquire(&self) -> Result<SlotPermit, EngineError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| EngineError::LimiterClosed)?;
        Ok(SlotPermit { _permit: permit })
    }

    /// Configured number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// A held slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct SlotPermit {
    _permit: OwnedSemaphorePermit,
}

impl SlotPermit {
    /// Frees the slot now.
    pub fn release(self) {
        drop(self);
    }
}
