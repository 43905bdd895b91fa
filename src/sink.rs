//! The downstream operation every assembled batch is flushed through.

use crate::ticket::WorkTicket;

/// Consumes one batch of tickets.
///
/// Called synchronously on a shard's worker thread. On success the sink is
/// expected to settle every ticket itself (typically with the stored
/// record). Returning an error rejects every ticket the sink has not settled
/// yet with that error. While a flush runs, nothing else in its shard
/// drains, so implementations should bound their own blocking.
pub trait BatchSink<T, R>: Send + Sync {
    fn flush(&self, batch: &mut [WorkTicket<T, R>]) -> anyhow::Result<()>;
}

impl<T, R, S> BatchSink<T, R> for std::sync::Arc<S>
where
    S: BatchSink<T, R> + ?Sized,
{
    fn flush(&self, batch: &mut [WorkTicket<T, R>]) -> anyhow::Result<()> {
        (**self).flush(batch)
    }
}

/// A sink backed by a closure. Built with [`from_fn`].
#[derive(Debug, Clone, Copy)]
pub struct FnSink<F>(F);

/// Build a sink from a closure.
///
/// ```
/// use batchline::sink::{from_fn, BatchSink};
/// use batchline::WorkTicket;
///
/// let sink = from_fn(|batch: &mut [WorkTicket<u32, u32>]| {
///     for ticket in batch.iter_mut() {
///         let doubled = ticket.payload() * 2;
///         ticket.resolve(doubled);
///     }
///     Ok(())
/// });
///
/// let (ticket, handle) = WorkTicket::new(21);
/// sink.flush(&mut [ticket]).unwrap();
/// assert_eq!(handle.wait().unwrap(), 42);
/// ```
pub fn from_fn<T, R, F>(f: F) -> FnSink<F>
where
    F: Fn(&mut [WorkTicket<T, R>]) -> anyhow::Result<()> + Send + Sync,
{
    FnSink(f)
}

impl<T, R, F> BatchSink<T, R> for FnSink<F>
where
    F: Fn(&mut [WorkTicket<T, R>]) -> anyhow::Result<()> + Send + Sync,
{
    fn flush(&self, batch: &mut [WorkTicket<T, R>]) -> anyhow::Result<()> {
        (self.0)(batch)
    }
}
