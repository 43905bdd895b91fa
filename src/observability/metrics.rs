//! OpenTelemetry metrics for the batching pipeline.
//!
//! Key metrics:
//! - batchline_submitted_total: Counter for submitted tickets
//! - batchline_batches_total: Counter for sink invocations
//! - batchline_batch_size: Histogram of tickets per sink invocation
//! - batchline_flush_latency_seconds: Histogram of sink call duration
//! - batchline_sink_failures_total: Counter for failed sink invocations
//!
//! Instruments are registered on the global meter, so a host that installs
//! its own meter provider (OTLP, Prometheus, ...) picks them up. Recording is
//! a no-op until [`init_metrics`] or [`register_metrics`] has run.

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::{ManualReader, SdkMeterProvider};
use std::sync::OnceLock;

/// Global metrics instance.
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Batchline metrics registry.
#[derive(Debug)]
pub struct Metrics {
    /// Total number of submitted tickets.
    pub submitted_total: Counter<u64>,
    /// Total number of sink invocations.
    pub batches_total: Counter<u64>,
    /// Tickets per sink invocation.
    pub batch_size: Histogram<u64>,
    /// Duration of sink invocations in seconds.
    pub flush_latency: Histogram<f64>,
    /// Sink invocations that returned an error or panicked.
    pub sink_failures_total: Counter<u64>,
}

impl Metrics {
    fn new(meter: &Meter) -> Self {
        Self {
            submitted_total: meter
                .u64_counter("batchline_submitted_total")
                .with_description("Total number of submitted tickets")
                .with_unit("1")
                .init(),
            batches_total: meter
                .u64_counter("batchline_batches_total")
                .with_description("Total number of sink invocations")
                .with_unit("1")
                .init(),
            batch_size: meter
                .u64_histogram("batchline_batch_size")
                .with_description("Tickets per sink invocation")
                .with_unit("1")
                .init(),
            flush_latency: meter
                .f64_histogram("batchline_flush_latency_seconds")
                .with_description("Sink invocation duration")
                .with_unit("s")
                .init(),
            sink_failures_total: meter
                .u64_counter("batchline_sink_failures_total")
                .with_description("Sink invocations that failed")
                .with_unit("1")
                .init(),
        }
    }
}

/// Register instruments on whatever global meter provider is installed.
///
/// Subsequent calls are ignored.
pub fn register_metrics() {
    METRICS.get_or_init(|| Metrics::new(&global::meter("batchline")));
}

/// Install a local meter provider (metrics are recorded but not exported)
/// and register instruments on it.
///
/// For standalone use, e.g. the load generator. Subsequent calls are ignored.
pub fn init_metrics() {
    METRICS.get_or_init(|| {
        let reader = ManualReader::builder().build();
        let provider = SdkMeterProvider::builder().with_reader(reader).build();
        global::set_meter_provider(provider);
        Metrics::new(&global::meter("batchline"))
    });
}

/// Get the global metrics instance, if registered.
pub fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

/// Record a submission routed to `shard`.
pub fn record_submit(shard: usize) {
    if let Some(m) = METRICS.get() {
        m.submitted_total
            .add(1, &[KeyValue::new("shard", shard as i64)]);
    }
}

/// Record a completed sink invocation.
pub fn record_batch(shard: usize, size: usize, latency_seconds: f64) {
    if let Some(m) = METRICS.get() {
        let attrs = [KeyValue::new("shard", shard as i64)];
        m.batches_total.add(1, &attrs);
        m.batch_size.record(size as u64, &attrs);
        m.flush_latency.record(latency_seconds, &attrs);
    }
}

/// Record a failed sink invocation.
pub fn record_sink_failure(shard: usize) {
    if let Some(m) = METRICS.get() {
        m.sink_failures_total
            .add(1, &[KeyValue::new("shard", shard as i64)]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        init_metrics();
        init_metrics();
        register_metrics();
        assert!(metrics().is_some());
    }

    #[test]
    fn test_record_does_not_panic() {
        init_metrics();
        record_submit(0);
        record_batch(1, 3, 0.001);
        record_sink_failure(1);
    }
}
