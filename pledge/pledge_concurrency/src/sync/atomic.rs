//! Atomic helpers used by the pool and the task handles.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A one-way latch, used for shutdown signalling.
#[derive(Debug, Default)]
pub struct AtomicFlag {
    flag: AtomicBool,
}

impl AtomicFlag {
    /// Create a new flag with the given initial state.
    pub fn new(initial_state: bool) -> Self {
        Self {
            flag: AtomicBool::new(initial_state),
        }
    }

    /// Set the flag if it is not already set.
    ///
    /// Returns true if this call set it, false if it was already set.
    pub fn try_set(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    /// Get the current state of the flag.
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Monotonic source of identifiers.
#[derive(Debug, Default)]
pub struct AtomicSequence {
    value: AtomicU64,
}

impl AtomicSequence {
    /// Create a sequence whose first value is `start`.
    pub fn new(start: u64) -> Self {
        Self {
            value: AtomicU64::new(start),
        }
    }

    /// Take the next identifier.
    pub fn next(&self) -> u64 {
        self.value.fetch_add(1, Ordering::Relaxed)
    }

    /// Peek at the identifier the next call will return.
    pub fn current(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Running maximum of observed samples.
#[derive(Debug, Default)]
pub struct AtomicMax {
    value: AtomicU64,
}

impl AtomicMax {
    /// Record a sample, raising the maximum if it is larger.
    pub fn observe(&self, sample: u64) {
        let mut current = self.value.load(Ordering::Relaxed);
        while sample > current {
            match self.value.compare_exchange(
                current,
                sample,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    /// The largest sample seen so far.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}
