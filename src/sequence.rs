//! Wrapping submission counter used to spread tickets across shards.
//!
//! A compare-and-swap loop rather than `fetch_add`, so the counter can wrap
//! at an arbitrary ceiling without losing concurrent updates.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Monotonic counter that wraps to zero after reaching its ceiling.
#[derive(Debug)]
pub struct ShardSequence {
    value: AtomicUsize,
    ceiling: usize,
}

impl Default for ShardSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardSequence {
    /// Create a sequence that wraps at `usize::MAX`.
    pub fn new() -> Self {
        Self::with_ceiling(usize::MAX)
    }

    /// Create a sequence whose largest value is `ceiling`.
    pub fn with_ceiling(ceiling: usize) -> Self {
        Self {
            value: AtomicUsize::new(0),
            ceiling,
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Advance the sequence and return the new value.
    pub fn next(&self) -> usize {
        loop {
            let current = self.value.load(Ordering::SeqCst);
            let next = if current >= self.ceiling { 0 } else { current + 1 };
            if self
                .value
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return next;
            }
            // CAS failed, retry
        }
    }

    /// Advance the sequence and map it onto `0..shards`.
    pub fn next_shard(&self, shards: usize) -> usize {
        self.next() % shards
    }

    /// Current value without advancing.
    pub fn current(&self) -> usize {
        self.value.load(Ordering::SeqCst)
    }
}
