//! Batch completion counters.

use std::sync::atomic::{AtomicU32, Ordering};

/// Tracks completion of a batch of jobs.
///
/// The counter starts at the batch size and every completing job decrements
/// it once. Decrements are release operations and [`value`](Self::value) is
/// an acquire load, so a waiter that observes the final value also observes
/// every write the jobs made.
///
/// Counters are owned by the [`JobManager`](crate::JobManager) that issued
/// them and retired through
/// [`wait_for_counter_and_free`](crate::JobManager::wait_for_counter_and_free).
pub struct Counter {
    value: AtomicU32,
}

impl Counter {
    pub(crate) fn new(value: u32) -> Self {
        Self {
            value: AtomicU32::new(value),
        }
    }

    /// Current value of the counter.
    pub fn value(&self) -> u32 {
        self.value.load(Ordering::Acquire)
    }

    pub(crate) fn decrement(&self) {
        self.value.fetch_sub(1, Ordering::Release);
    }
}
