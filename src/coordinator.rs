//! Sharded submission front door.
//!
//! Owns a fixed set of shards, each a queue plus the worker thread that
//! drains it, and spreads submissions across them with a wrapping sequence.
//! There is no ordering between shards: two submissions from one caller may
//! settle in either order.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::config::BatchConfig;
use crate::error::{BatchError, CoordinatorError, PutError};
use crate::observability::metrics::record_submit;
use crate::queue::LinkedQueue;
use crate::sequence::ShardSequence;
use crate::sink::BatchSink;
use crate::ticket::{ResultHandle, WorkTicket};
use crate::worker::{BatchWorker, TicketQueue};

struct Shard<T, R> {
    queue: Arc<TicketQueue<T, R>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Batches submissions from many callers into sink calls of bounded size.
///
/// ```
/// use batchline::{sink::from_fn, BatchConfig, BatchCoordinator, WorkTicket};
///
/// let coordinator = BatchCoordinator::new(
///     BatchConfig::new(100, 2),
///     from_fn(|batch: &mut [WorkTicket<String, usize>]| {
///         for ticket in batch.iter_mut() {
///             let len = ticket.payload().len();
///             ticket.resolve(len);
///         }
///         Ok(())
///     }),
/// )
/// .unwrap();
///
/// let handle = coordinator.submit("hello".to_string());
/// assert_eq!(handle.wait().unwrap(), 5);
/// coordinator.shutdown().unwrap();
/// ```
pub struct BatchCoordinator<T, R> {
    config: BatchConfig,
    shards: Vec<Shard<T, R>>,
    sequence: ShardSequence,
}

impl<T, R> BatchCoordinator<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    /// Validate `config` and start one worker thread per shard.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::InvalidConfig`] for zero-valued settings
    /// and [`CoordinatorError::Spawn`] if a worker thread cannot be started.
    /// Workers started before a spawn failure are shut down.
    pub fn new<S>(config: BatchConfig, sink: S) -> Result<Self, CoordinatorError>
    where
        S: BatchSink<T, R> + 'static,
    {
        config.validate()?;
        let sink: Arc<dyn BatchSink<T, R>> = Arc::new(sink);

        let mut coordinator = Self {
            config,
            shards: Vec::with_capacity(config.worker_count),
            sequence: ShardSequence::new(),
        };

        for shard in 0..config.worker_count {
            let queue = match config.queue_capacity {
                Some(capacity) => LinkedQueue::new(capacity)
                    .map_err(|e| CoordinatorError::InvalidConfig(e.to_string()))?,
                None => LinkedQueue::unbounded(),
            };
            let queue = Arc::new(queue);
            let worker = BatchWorker::new(
                shard,
                Arc::clone(&queue),
                config.batch_size,
                Arc::clone(&sink),
            );
            // On error, dropping `coordinator` closes the queues already started.
            let handle = worker.spawn()?;
            coordinator.shards.push(Shard {
                queue,
                worker: Mutex::new(Some(handle)),
            });
        }

        tracing::info!(
            workers = config.worker_count,
            batch_size = config.batch_size,
            queue_capacity = ?config.queue_capacity,
            "Batch coordinator started"
        );
        Ok(coordinator)
    }

    /// Queue `payload` on the next shard and return its result handle.
    ///
    /// Blocks only while that shard's queue is bounded and full. After
    /// [`shutdown`](Self::shutdown), the returned handle is already rejected
    /// with [`BatchError::ShutDown`].
    pub fn submit(&self, payload: T) -> ResultHandle<R> {
        let (ticket, handle) = WorkTicket::new(payload);
        let shard = self.sequence.next_shard(self.shards.len());
        match self.shards[shard].queue.put(ticket) {
            Ok(()) => record_submit(shard),
            Err(err) => {
                err.into_inner().reject(BatchError::ShutDown);
            }
        }
        handle
    }

    /// Queue `payload` only if the chosen shard has room right now.
    ///
    /// # Errors
    ///
    /// Returns the payload inside [`PutError::Full`] if the shard's queue is
    /// at capacity, or inside [`PutError::Closed`] after shutdown.
    pub fn try_submit(&self, payload: T) -> Result<ResultHandle<R>, PutError<T>> {
        let (ticket, handle) = WorkTicket::new(payload);
        let shard = self.sequence.next_shard(self.shards.len());
        match self.shards[shard].queue.offer(ticket) {
            Ok(()) => {
                record_submit(shard);
                Ok(handle)
            }
            Err(PutError::Full(ticket)) => Err(PutError::Full(ticket.into_payload())),
            Err(PutError::Closed(ticket)) => Err(PutError::Closed(ticket.into_payload())),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn worker_count(&self) -> usize {
        self.shards.len()
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    /// Tickets queued across all shards and not yet picked up by a worker.
    pub fn pending(&self) -> usize {
        self.shards.iter().map(|s| s.queue.len()).sum()
    }

    /// Stop accepting submissions, flush everything already queued, and
    /// wait for every worker thread to finish.
    ///
    /// Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::WorkerPanic`] for the first worker thread
    /// that did not exit cleanly.
    pub fn shutdown(&self) -> Result<(), CoordinatorError> {
        let pending = self.pending();
        tracing::info!(pending, "Shutting down batch coordinator");
        self.close();

        let mut result = Ok(());
        for (index, shard) in self.shards.iter().enumerate() {
            let handle = shard
                .worker
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(handle) = handle {
                if handle.join().is_err() && result.is_ok() {
                    tracing::error!(shard = index, "Worker thread panicked");
                    result = Err(CoordinatorError::WorkerPanic(index));
                }
            }
        }
        tracing::info!("Batch coordinator stopped");
        result
    }
}

impl<T, R> BatchCoordinator<T, R> {
    fn close(&self) {
        for shard in &self.shards {
            shard.queue.close();
        }
    }
}

impl<T, R> Drop for BatchCoordinator<T, R> {
    // Detached workers still flush whatever was queued before they exit.
    fn drop(&mut self) {
        self.close();
    }
}
