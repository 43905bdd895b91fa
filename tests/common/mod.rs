//! Test utilities shared by the integration tests.
//!
//! Provides:
//! - A recording sink that echoes payloads and remembers every batch
//! - Failure injection for the first N sink calls
//! - Polling helper for asynchronous conditions

#![allow(dead_code)]

use batchline::{BatchSink, WorkTicket};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("injected failure on sink call {0}")]
pub struct InjectedFailure(pub usize);

/// Sink that resolves every ticket with its own payload and records batches.
///
/// Clones share the same recording, so a test can keep one clone and hand
/// the other to a coordinator.
#[derive(Clone, Default)]
pub struct RecordingSink {
    batches: Arc<Mutex<Vec<Vec<u64>>>>,
    calls: Arc<AtomicUsize>,
    fail_first: usize,
    delay: Option<Duration>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `calls` sink invocations with [`InjectedFailure`].
    pub fn failing_first(mut self, calls: usize) -> Self {
        self.fail_first = calls;
        self
    }

    /// Sleep for `delay` inside every sink call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Payloads of every successful batch, in flush order.
    pub fn batches(&self) -> Vec<Vec<u64>> {
        self.batches.lock().unwrap().clone()
    }

    /// Every payload flushed successfully, across all batches.
    pub fn flushed(&self) -> Vec<u64> {
        self.batches().into_iter().flatten().collect()
    }

    /// Number of sink invocations, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BatchSink<u64, u64> for RecordingSink {
    fn flush(&self, batch: &mut [WorkTicket<u64, u64>]) -> anyhow::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if call < self.fail_first {
            return Err(InjectedFailure(call).into());
        }

        let payloads: Vec<u64> = batch.iter().map(|t| *t.payload()).collect();
        for ticket in batch.iter_mut() {
            let value = *ticket.payload();
            ticket.resolve(value);
        }
        self.batches.lock().unwrap().push(payloads);
        Ok(())
    }
}

/// Wait for a condition to become true with timeout.
///
/// Returns `true` if the condition was met, `false` if the timeout expired.
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_shares_state_between_clones() {
        let sink = RecordingSink::new();
        let clone = sink.clone();
        let (ticket, handle) = WorkTicket::new(7);
        clone.flush(&mut [ticket]).unwrap();

        assert_eq!(sink.batches(), vec![vec![7]]);
        assert_eq!(sink.calls(), 1);
        assert_eq!(handle.wait().unwrap(), 7);
    }
}
