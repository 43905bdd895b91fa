//! Work tickets and their settle-once result handles.
//!
//! A [`WorkTicket`] pairs a submitted payload with the sending half of a
//! oneshot channel; the matching [`ResultHandle`] is what the submitter
//! keeps. Settlement consumes the sender, so a ticket settles at most once,
//! and a ticket dropped unsettled completes its handle with
//! [`BatchError::Abandoned`].

use futures::future::{FutureExt, Shared};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

use crate::error::BatchError;

/// Outcome delivered to a ticket's result handle.
pub type Outcome<R> = Result<R, BatchError>;

/// A submitted payload awaiting settlement.
pub struct WorkTicket<T, R> {
    payload: T,
    settler: Option<oneshot::Sender<Outcome<R>>>,
}

impl<T, R> WorkTicket<T, R> {
    /// Create a ticket and the handle its submitter awaits.
    pub fn new(payload: T) -> (Self, ResultHandle<R>) {
        let (tx, rx) = oneshot::channel();
        let ticket = Self {
            payload,
            settler: Some(tx),
        };
        (ticket, ResultHandle { rx })
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Give the payload back. An unsettled ticket's handle sees
    /// [`BatchError::Abandoned`].
    pub fn into_payload(self) -> T {
        self.payload
    }

    pub fn is_settled(&self) -> bool {
        self.settler.is_none()
    }

    /// Complete the ticket successfully.
    ///
    /// Returns `false` if the ticket was already settled; the earlier outcome
    /// is kept. A handle that was dropped by its submitter still counts as
    /// settled.
    pub fn resolve(&mut self, value: R) -> bool {
        self.settle(Ok(value))
    }

    /// Complete the ticket with an error. Same rules as [`resolve`](Self::resolve).
    pub fn reject(&mut self, error: BatchError) -> bool {
        self.settle(Err(error))
    }

    fn settle(&mut self, outcome: Outcome<R>) -> bool {
        match self.settler.take() {
            Some(tx) => {
                // The submitter may have stopped waiting; nothing to report.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }
}

impl<T: fmt::Debug, R> fmt::Debug for WorkTicket<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkTicket")
            .field("payload", &self.payload)
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// The submitter's view of a ticket's eventual outcome.
///
/// Await it from async code, or call [`wait`](Self::wait) from a plain
/// thread.
#[must_use = "a result handle does nothing unless awaited or waited on"]
#[derive(Debug)]
pub struct ResultHandle<R> {
    rx: oneshot::Receiver<Outcome<R>>,
}

impl<R> ResultHandle<R> {
    /// A handle that is already settled with `outcome`.
    pub fn settled(outcome: Outcome<R>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { rx }
    }

    /// Block the current thread until the ticket settles.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async runtime; await the handle
    /// there instead.
    pub fn wait(self) -> Outcome<R> {
        self.rx.blocking_recv().unwrap_or(Err(BatchError::Abandoned))
    }

    /// The outcome, if the ticket has settled already.
    ///
    /// Once this returns `Some`, the handle is spent and later calls return
    /// `Some(Err(BatchError::Abandoned))`.
    pub fn try_result(&mut self) -> Option<Outcome<R>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(BatchError::Abandoned)),
        }
    }

    /// Turn the handle into a cloneable future for several observers.
    pub fn shared(self) -> Shared<Self>
    where
        R: Clone,
    {
        FutureExt::shared(self)
    }
}

impl<R> Future for ResultHandle<R> {
    type Output = Outcome<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(BatchError::Abandoned)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready};

    #[test]
    fn test_resolve_once() {
        let (mut ticket, handle) = WorkTicket::<&str, u32>::new("payload");
        assert_eq!(*ticket.payload(), "payload");
        assert!(!ticket.is_settled());

        assert!(ticket.resolve(1));
        assert!(ticket.is_settled());
        assert!(!ticket.resolve(2));
        assert!(!ticket.reject(BatchError::ShutDown));

        assert_eq!(handle.wait().unwrap(), 1);
    }

    #[test]
    fn test_reject_keeps_first_outcome() {
        let (mut ticket, handle) = WorkTicket::<(), u32>::new(());
        assert!(ticket.reject(BatchError::ShutDown));
        assert!(!ticket.resolve(5));
        assert!(matches!(handle.wait(), Err(BatchError::ShutDown)));
    }

    #[test]
    fn test_dropped_ticket_is_abandoned() {
        let (ticket, handle) = WorkTicket::<(), u32>::new(());
        drop(ticket);
        assert!(matches!(handle.wait(), Err(BatchError::Abandoned)));
    }

    #[test]
    fn test_handle_pending_until_settled() {
        let (mut ticket, handle) = WorkTicket::<(), u32>::new(());
        let mut task = tokio_test::task::spawn(handle);
        assert_pending!(task.poll());

        ticket.resolve(9);
        assert!(task.is_woken());
        let outcome = assert_ready!(task.poll());
        assert_eq!(outcome.unwrap(), 9);
    }

    #[test]
    fn test_try_result() {
        let (mut ticket, mut handle) = WorkTicket::<(), u32>::new(());
        assert!(handle.try_result().is_none());
        ticket.resolve(3);
        assert_eq!(handle.try_result().unwrap().unwrap(), 3);
    }

    #[test]
    fn test_settled_handle() {
        let handle = ResultHandle::<u32>::settled(Err(BatchError::ShutDown));
        assert!(matches!(handle.wait(), Err(BatchError::ShutDown)));
    }

    #[tokio::test]
    async fn test_shared_handle_has_many_readers() {
        let (mut ticket, handle) = WorkTicket::<(), String>::new(());
        let shared = handle.shared();
        let a = shared.clone();
        let b = shared;

        ticket.resolve("done".to_string());
        assert_eq!(a.await.unwrap(), "done");
        assert_eq!(b.await.unwrap(), "done");
    }

    #[test]
    fn test_resolve_after_handle_dropped() {
        let (mut ticket, handle) = WorkTicket::<(), u32>::new(());
        drop(handle);
        assert!(ticket.resolve(1));
        assert!(!ticket.resolve(2));
    }
}
