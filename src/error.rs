//! Error types for queues, tickets and the coordinator.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error type for queue operations that do not hand an element back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue capacity must be at least 1")]
    InvalidCapacity,

    #[error("index {index} out of bounds for queue of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// The queue was closed while (or before) waiting.
    #[error("queue is closed")]
    Closed,
}

/// A rejected insertion. Carries the element back to the caller.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum PutError<E> {
    /// No room before the deadline (or immediately, for non-blocking offers).
    #[error("queue is full")]
    Full(E),

    #[error("queue is closed")]
    Closed(E),
}

impl<E> PutError<E> {
    /// Recover the element that could not be inserted.
    pub fn into_inner(self) -> E {
        match self {
            Self::Full(e) | Self::Closed(e) => e,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

/// Failure outcome delivered through a ticket's result handle.
///
/// Cloneable so that one sink failure can be broadcast to every ticket of a
/// batch and so that shared handles can hand the same outcome to many readers.
#[derive(Debug, Clone, Error)]
pub enum BatchError {
    /// The sink returned an error for the batch containing this ticket,
    /// or rejected this ticket individually.
    #[error("sink failed: {0}")]
    Sink(SinkFailure),

    /// The sink panicked while processing the batch.
    #[error("sink panicked: {0}")]
    Panicked(String),

    /// The ticket was dropped without ever being settled.
    #[error("ticket dropped before settlement")]
    Abandoned,

    /// The payload was submitted after the coordinator shut down.
    #[error("coordinator is shut down")]
    ShutDown,
}

impl BatchError {
    /// Wrap an arbitrary error as a sink failure.
    pub fn sink(error: impl Into<anyhow::Error>) -> Self {
        Self::Sink(SinkFailure::new(error.into()))
    }
}

/// A sink error shared between every ticket it settles.
#[derive(Clone)]
pub struct SinkFailure(Arc<anyhow::Error>);

impl SinkFailure {
    pub fn new(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }

    /// Attempt to view the underlying error as a concrete type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// True if both failures came from the same sink error.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SinkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for SinkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `{:#}` keeps anyhow's context chain on one line.
        write!(f, "{:#}", self.0)
    }
}

/// Error type for building and running a coordinator.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("worker thread {0} panicked")]
    WorkerPanic(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("disk full")]
    struct DiskFull;

    #[test]
    fn test_put_error_returns_element() {
        let err = PutError::Full(7);
        assert!(err.is_full());
        assert_eq!(err.into_inner(), 7);

        let err = PutError::Closed("x");
        assert!(err.is_closed());
        assert_eq!(err.into_inner(), "x");
    }

    #[test]
    fn test_sink_failure_downcast_and_identity() {
        let err = BatchError::sink(DiskFull);
        let copy = err.clone();

        match (&err, &copy) {
            (BatchError::Sink(a), BatchError::Sink(b)) => {
                assert!(a.same_as(b));
                assert!(a.downcast_ref::<DiskFull>().is_some());
            }
            _ => panic!("expected sink failures"),
        }
        assert_eq!(err.to_string(), "sink failed: disk full");
    }
}
