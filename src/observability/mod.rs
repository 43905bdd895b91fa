//! Observability infrastructure.
//!
//! Provides:
//! - Structured logging setup via tracing-subscriber
//! - OpenTelemetry metrics for submissions and sink calls

pub mod metrics;
pub mod tracing;
