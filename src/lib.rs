//! Batchline: sharded write batching with per-request results.
//!
//! Many concurrent callers submit independent payloads; each shard's worker
//! groups whatever is queued into a batch of bounded size and hands it to a
//! single sink call. Every caller still gets its own settle-once result.
//!
//! # Architecture
//!
//! - **Split-lock queue**: producers and the consumer contend on different locks
//! - **One worker thread per shard**: block for the first ticket, then drain greedily
//! - **Round-robin routing**: a wrapping CAS sequence picks the shard
//! - **Settle-once handles**: a failed batch rejects every unsettled ticket with one error
//!
//! # Modules
//!
//! - [`config`]: CLI and environment configuration
//! - [`coordinator`]: Shard ownership and submission
//! - [`error`]: Error types
//! - [`observability`]: Tracing and metrics setup
//! - [`queue`]: Bounded blocking linked queue
//! - [`sequence`]: Wrapping shard counter
//! - [`sink`]: The batch consumer seam
//! - [`ticket`]: Work tickets and result handles
//! - [`worker`]: Per-shard consumer loop

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // queue::LinkedQueue is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc       // Panic docs can be verbose
)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod observability;
pub mod queue;
pub mod sequence;
pub mod sink;
pub mod ticket;
pub mod worker;

pub use config::BatchConfig;
pub use coordinator::BatchCoordinator;
pub use error::{BatchError, CoordinatorError, PutError, QueueError, SinkFailure};
pub use queue::LinkedQueue;
pub use sink::BatchSink;
pub use ticket::{Outcome, ResultHandle, WorkTicket};
pub use worker::BatchWorker;
