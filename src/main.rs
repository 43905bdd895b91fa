//! Batchline load generator.
//!
//! Drives a coordinator whose sink stands in for a storage layer: each batch
//! costs one simulated round trip and every record gets a UUIDv7 id.
//!
//! # Usage
//!
//! ```bash
//! batchline --producers 16 --records 10000 --batch-size 500 --workers 8
//! ```
//!
//! Environment variables can also be used:
//! - `BATCHLINE_BATCH_SIZE`, `BATCHLINE_WORKERS`, `BATCHLINE_QUEUE_CAPACITY`
//! - `BATCHLINE_PRODUCERS`, `BATCHLINE_RECORDS`
//! - `RUST_LOG`: Log filter (overrides `--log-level`)

use anyhow::Context;
use batchline::observability::metrics::init_metrics;
use batchline::observability::tracing::init_tracing;
use batchline::{BatchConfig, BatchCoordinator, BatchSink, WorkTicket};
use clap::Parser;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Batchline load generator: measure batching throughput against a simulated store.
#[derive(Parser, Debug, Clone)]
#[command(name = "batchline")]
#[command(author, version, about, long_about = None)]
struct Config {
    #[command(flatten)]
    batch: BatchConfig,

    /// Number of concurrent producers
    #[arg(long, env = "BATCHLINE_PRODUCERS", default_value_t = 16)]
    producers: usize,

    /// Records submitted by each producer
    #[arg(long, env = "BATCHLINE_RECORDS", default_value_t = 10_000)]
    records: usize,

    /// Simulated store round trip per batch, in microseconds
    #[arg(long, default_value_t = 500)]
    store_latency_us: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs and the final report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone)]
struct NewRecord {
    producer: usize,
    seq: usize,
}

#[derive(Debug, Clone)]
struct StoredRecord {
    id: Uuid,
    producer: usize,
    seq: usize,
}

/// Pretends to persist a batch in one round trip and assigns ids.
struct SimulatedStore {
    latency: Duration,
    batches: AtomicUsize,
}

impl BatchSink<NewRecord, StoredRecord> for SimulatedStore {
    fn flush(&self, batch: &mut [WorkTicket<NewRecord, StoredRecord>]) -> anyhow::Result<()> {
        std::thread::sleep(self.latency);
        self.batches.fetch_add(1, Ordering::Relaxed);
        for ticket in batch.iter_mut() {
            let record = ticket.payload();
            let stored = StoredRecord {
                id: Uuid::now_v7(),
                producer: record.producer,
                seq: record.seq,
            };
            ticket.resolve(stored);
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct LoadReport {
    producers: usize,
    submitted: usize,
    succeeded: usize,
    failed: usize,
    workers: usize,
    batch_size: usize,
    batches: usize,
    distinct_ids: usize,
    first_id: Option<String>,
    last_id: Option<String>,
    mean_batch_size: f64,
    elapsed_ms: f64,
    records_per_sec: f64,
}

impl LoadReport {
    fn print(&self) {
        eprintln!(
            r#"
  Batchline v{} - load report

    Producers:       {}
    Submitted:       {}
    Succeeded:       {}
    Failed:          {}
    Workers:         {}
    Batch size:      {}
    Sink calls:      {}
    Distinct ids:    {}
    Id range:        {} .. {}
    Mean batch:      {:.1}
    Elapsed:         {:.1} ms
    Throughput:      {:.0} records/s
"#,
            env!("CARGO_PKG_VERSION"),
            self.producers,
            self.submitted,
            self.succeeded,
            self.failed,
            self.workers,
            self.batch_size,
            self.batches,
            self.distinct_ids,
            self.first_id.as_deref().unwrap_or("-"),
            self.last_id.as_deref().unwrap_or("-"),
            self.mean_batch_size,
            self.elapsed_ms,
            self.records_per_sec,
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    init_tracing(&config.log_level, config.json);
    init_metrics();

    let store = Arc::new(SimulatedStore {
        latency: Duration::from_micros(config.store_latency_us),
        batches: AtomicUsize::new(0),
    });
    let coordinator: Arc<BatchCoordinator<NewRecord, StoredRecord>> = Arc::new(
        BatchCoordinator::new(config.batch, Arc::clone(&store))
            .context("failed to start batch coordinator")?,
    );

    tracing::info!(
        producers = config.producers,
        records = config.records,
        "Starting load"
    );
    let start = Instant::now();

    let producers: Vec<_> = (0..config.producers)
        .map(|producer| {
            let coordinator = Arc::clone(&coordinator);
            let records = config.records;
            tokio::spawn(async move {
                // Submission may block on a bounded queue; keep it off the runtime.
                let handles = tokio::task::spawn_blocking(move || {
                    (0..records)
                        .map(|seq| coordinator.submit(NewRecord { producer, seq }))
                        .collect::<Vec<_>>()
                })
                .await?;

                let mut ids = Vec::with_capacity(records);
                let mut failed = 0;
                for (seq, outcome) in join_all(handles).await.into_iter().enumerate() {
                    match outcome {
                        Ok(stored) if stored.producer == producer && stored.seq == seq => {
                            ids.push(stored.id);
                        }
                        Ok(stored) => {
                            tracing::error!(producer, seq, ?stored, "Result settled on the wrong ticket");
                            failed += 1;
                        }
                        Err(e) => {
                            if failed == 0 {
                                tracing::warn!(producer, seq, error = %e, "Producer saw failures");
                            }
                            failed += 1;
                        }
                    }
                }
                anyhow::Ok((ids, failed))
            })
        })
        .collect();

    let mut load = join_all(producers);
    let results = tokio::select! {
        results = &mut load => results,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, flushing queued records and stopping");
            let coordinator = Arc::clone(&coordinator);
            tokio::task::spawn_blocking(move || coordinator.shutdown())
                .await
                .context("shutdown task panicked")??;
            // Submissions after shutdown settle immediately as failures.
            load.await
        }
    };

    let mut ids = HashSet::new();
    let mut succeeded = 0;
    let mut failed = 0;
    for producer in results {
        let (stored, err) = producer.context("producer task panicked")??;
        succeeded += stored.len();
        failed += err;
        ids.extend(stored);
    }
    if ids.len() != succeeded {
        tracing::error!(succeeded, distinct = ids.len(), "Store handed out duplicate ids");
    }
    let elapsed = start.elapsed();

    let shutdown = Arc::clone(&coordinator);
    tokio::task::spawn_blocking(move || shutdown.shutdown())
        .await
        .context("shutdown task panicked")??;

    let batches = store.batches.load(Ordering::Relaxed);
    let submitted = config.producers * config.records;
    let report = LoadReport {
        producers: config.producers,
        submitted,
        succeeded,
        failed,
        workers: config.batch.worker_count,
        batch_size: config.batch.batch_size,
        batches,
        distinct_ids: ids.len(),
        first_id: ids.iter().min().map(Uuid::to_string),
        last_id: ids.iter().max().map(Uuid::to_string),
        mean_batch_size: if batches == 0 {
            0.0
        } else {
            succeeded as f64 / batches as f64
        },
        elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        records_per_sec: submitted as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
    };

    if config.json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        report.print();
    }
    Ok(())
}
