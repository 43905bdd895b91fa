//! Per-shard consumer loop.
//!
//! Each worker is the only consumer of its queue. One iteration:
//! 1. block until the first ticket arrives,
//! 2. greedily poll more tickets without blocking, up to the batch size,
//! 3. hand the batch to the sink on this thread.
//!
//! A batch is therefore never held back waiting to fill up: whatever is
//! queued when the first ticket arrives goes out together.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::error::{BatchError, QueueError};
use crate::observability::metrics::{record_batch, record_sink_failure};
use crate::queue::LinkedQueue;
use crate::sink::BatchSink;
use crate::ticket::WorkTicket;

/// Queue type owned by one shard.
pub type TicketQueue<T, R> = LinkedQueue<WorkTicket<T, R>>;

/// Consumes one shard's queue and flushes batches through the sink.
pub struct BatchWorker<T, R> {
    shard: usize,
    queue: Arc<TicketQueue<T, R>>,
    batch_size: usize,
    sink: Arc<dyn BatchSink<T, R>>,
}

impl<T, R> BatchWorker<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    /// Create a worker for `shard`. A `batch_size` of zero is treated as 1.
    pub fn new(
        shard: usize,
        queue: Arc<TicketQueue<T, R>>,
        batch_size: usize,
        sink: Arc<dyn BatchSink<T, R>>,
    ) -> Self {
        Self {
            shard,
            queue,
            batch_size: batch_size.max(1),
            sink,
        }
    }

    pub fn shard(&self) -> usize {
        self.shard
    }

    pub fn queue(&self) -> &Arc<TicketQueue<T, R>> {
        &self.queue
    }

    /// Assemble the next batch: 1 to `batch_size` tickets in FIFO order.
    ///
    /// Blocks only for the first ticket.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] once the queue is closed and empty.
    pub fn next_batch(&self) -> Result<Vec<WorkTicket<T, R>>, QueueError> {
        let first = self.queue.take()?;
        let mut batch = Vec::with_capacity(self.batch_size);
        batch.push(first);
        while batch.len() < self.batch_size {
            match self.queue.poll() {
                Some(ticket) => batch.push(ticket),
                None => break,
            }
        }
        Ok(batch)
    }

    /// Flush `batch` through the sink and settle whatever the sink did not.
    ///
    /// A sink error or panic rejects every ticket the sink left unsettled
    /// with one shared [`BatchError`]. Tickets still unsettled after a
    /// successful flush are dropped, which completes their handles with
    /// [`BatchError::Abandoned`].
    pub fn dispatch(&self, mut batch: Vec<WorkTicket<T, R>>) {
        let size = batch.len();
        let start = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.sink.flush(&mut batch)));
        let latency = start.elapsed().as_secs_f64();
        record_batch(self.shard, size, latency);

        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                tracing::error!(shard = self.shard, size, error = %e, "Sink failed, rejecting batch");
                Some(BatchError::sink(e))
            }
            Err(payload) => {
                let message = panic_message(&*payload);
                tracing::error!(shard = self.shard, size, panic = %message, "Sink panicked, rejecting batch");
                Some(BatchError::Panicked(message))
            }
        };

        match failure {
            Some(error) => {
                record_sink_failure(self.shard);
                for ticket in &mut batch {
                    ticket.reject(error.clone());
                }
            }
            None => {
                let unsettled = batch.iter().filter(|t| !t.is_settled()).count();
                if unsettled > 0 {
                    tracing::warn!(
                        shard = self.shard,
                        size,
                        unsettled,
                        "Sink returned without settling every ticket"
                    );
                }
            }
        }

        tracing::trace!(shard = self.shard, size, latency_ms = latency * 1000.0, "Batch flushed");
    }

    /// Run until the queue is closed and drained.
    pub fn run(self) {
        tracing::debug!(shard = self.shard, batch_size = self.batch_size, "Worker started");
        loop {
            match self.next_batch() {
                Ok(batch) => self.dispatch(batch),
                Err(QueueError::Closed) => break,
                Err(e) => {
                    tracing::error!(shard = self.shard, error = %e, "Worker stopping on queue error");
                    break;
                }
            }
        }
        tracing::debug!(shard = self.shard, "Worker stopped");
    }

    /// Run the worker on a dedicated, named thread.
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("batchline-worker-{}", self.shard))
            .spawn(move || self.run())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::from_fn;
    use crate::ticket::ResultHandle;
    use std::sync::Mutex;

    #[derive(Debug, thiserror::Error)]
    #[error("store unavailable")]
    struct StoreUnavailable;

    fn echo_sink() -> Arc<dyn BatchSink<u32, u32>> {
        Arc::new(from_fn(|batch: &mut [WorkTicket<u32, u32>]| {
            for ticket in batch.iter_mut() {
                let value = *ticket.payload();
                ticket.resolve(value);
            }
            Ok(())
        }))
    }

    fn worker_with(
        batch_size: usize,
        sink: Arc<dyn BatchSink<u32, u32>>,
    ) -> BatchWorker<u32, u32> {
        BatchWorker::new(0, Arc::new(LinkedQueue::unbounded()), batch_size, sink)
    }

    fn enqueue(worker: &BatchWorker<u32, u32>, payloads: impl IntoIterator<Item = u32>) -> Vec<ResultHandle<u32>> {
        payloads
            .into_iter()
            .map(|p| {
                let (ticket, handle) = WorkTicket::new(p);
                worker.queue().put(ticket).unwrap();
                handle
            })
            .collect()
    }

    #[test]
    fn test_next_batch_is_bounded_and_fifo() {
        let worker = worker_with(3, echo_sink());
        let _handles = enqueue(&worker, 1..=7);

        let sizes_and_payloads: Vec<Vec<u32>> = (0..3)
            .map(|_| {
                worker
                    .next_batch()
                    .unwrap()
                    .iter()
                    .map(|t| *t.payload())
                    .collect()
            })
            .collect();
        assert_eq!(
            sizes_and_payloads,
            vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]
        );
    }

    #[test]
    fn test_short_batch_when_queue_runs_dry() {
        let worker = worker_with(10, echo_sink());
        let _handles = enqueue(&worker, [1, 2]);
        assert_eq!(worker.next_batch().unwrap().len(), 2);
        assert!(worker.queue().is_empty());
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let worker = worker_with(0, echo_sink());
        let _handles = enqueue(&worker, [1, 2]);
        assert_eq!(worker.next_batch().unwrap().len(), 1);
    }

    #[test]
    fn test_dispatch_success() {
        let worker = worker_with(4, echo_sink());
        let handles = enqueue(&worker, [5, 6]);
        worker.dispatch(worker.next_batch().unwrap());
        let results: Vec<_> = handles.into_iter().map(|h| h.wait().unwrap()).collect();
        assert_eq!(results, vec![5, 6]);
    }

    #[test]
    fn test_dispatch_failure_broadcasts_same_error() {
        let sink: Arc<dyn BatchSink<u32, u32>> =
            Arc::new(from_fn(|_: &mut [WorkTicket<u32, u32>]| {
                Err(StoreUnavailable.into())
            }));
        let worker = worker_with(4, sink);
        let handles = enqueue(&worker, [1, 2, 3]);
        worker.dispatch(worker.next_batch().unwrap());

        let failures: Vec<_> = handles
            .into_iter()
            .map(|h| match h.wait() {
                Err(BatchError::Sink(failure)) => failure,
                other => panic!("expected sink failure, got {other:?}"),
            })
            .collect();
        assert_eq!(failures.len(), 3);
        assert!(failures[0].downcast_ref::<StoreUnavailable>().is_some());
        assert!(failures.iter().all(|f| f.same_as(&failures[0])));
    }

    #[test]
    fn test_failure_does_not_overwrite_settled_tickets() {
        let sink: Arc<dyn BatchSink<u32, u32>> =
            Arc::new(from_fn(|batch: &mut [WorkTicket<u32, u32>]| {
                batch[0].resolve(100);
                anyhow::bail!("second write failed")
            }));
        let worker = worker_with(4, sink);
        let mut handles = enqueue(&worker, [1, 2]).into_iter();
        worker.dispatch(worker.next_batch().unwrap());

        assert_eq!(handles.next().unwrap().wait().unwrap(), 100);
        let err = handles.next().unwrap().wait().unwrap_err();
        assert_eq!(err.to_string(), "sink failed: second write failed");
    }

    #[test]
    fn test_unsettled_tickets_are_abandoned() {
        let sink: Arc<dyn BatchSink<u32, u32>> =
            Arc::new(from_fn(|_: &mut [WorkTicket<u32, u32>]| Ok(())));
        let worker = worker_with(4, sink);
        let handles = enqueue(&worker, [1]);
        worker.dispatch(worker.next_batch().unwrap());
        for handle in handles {
            assert!(matches!(handle.wait(), Err(BatchError::Abandoned)));
        }
    }

    #[test]
    fn test_sink_panic_rejects_batch() {
        let sink: Arc<dyn BatchSink<u32, u32>> =
            Arc::new(from_fn(|_: &mut [WorkTicket<u32, u32>]| -> anyhow::Result<()> {
                panic!("boom")
            }));
        let worker = worker_with(4, sink);
        let handles = enqueue(&worker, [1, 2]);
        worker.dispatch(worker.next_batch().unwrap());
        for handle in handles {
            match handle.wait() {
                Err(BatchError::Panicked(message)) => assert_eq!(message, "boom"),
                other => panic!("expected panic rejection, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_run_drains_then_stops_when_closed() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink: Arc<dyn BatchSink<u32, u32>> = {
            let seen = Arc::clone(&seen);
            Arc::new(from_fn(move |batch: &mut [WorkTicket<u32, u32>]| {
                seen.lock().unwrap().push(batch.len());
                for ticket in batch.iter_mut() {
                    let value = *ticket.payload();
                    ticket.resolve(value);
                }
                Ok(())
            }))
        };
        let worker = worker_with(2, sink);
        let queue = Arc::clone(worker.queue());
        let handles = enqueue(&worker, 0..5);
        queue.close();

        let thread = worker.spawn().unwrap();
        thread.join().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![2, 2, 1]);
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.wait().unwrap(), i as u32);
        }
    }
}
