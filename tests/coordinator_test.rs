//! End-to-end tests for the batch coordinator.
//!
//! Tests:
//! - Concurrent submitters each get exactly their own result
//! - Batches respect the configured size and per-shard FIFO order
//! - A failing batch rejects only its own tickets
//! - Bounded shard queues push back on submitters

mod common;

use batchline::sink::from_fn;
use batchline::{BatchConfig, BatchCoordinator, BatchError, PutError, WorkTicket};
use common::{wait_for, InjectedFailure, RecordingSink};
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submitters_get_their_own_results() {
    let sink = RecordingSink::new();
    let coordinator = Arc::new(
        BatchCoordinator::new(BatchConfig::new(16, 4), sink.clone()).expect("start coordinator"),
    );

    let tasks: Vec<_> = (0..8u64)
        .map(|producer| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                let handles: Vec<_> = (0..250u64)
                    .map(|i| coordinator.submit(producer * 1_000 + i))
                    .collect();
                let results = join_all(handles).await;
                for (i, result) in results.into_iter().enumerate() {
                    assert_eq!(result.expect("submission failed"), producer * 1_000 + i as u64);
                }
            })
        })
        .collect();
    for task in join_all(tasks).await {
        task.expect("producer panicked");
    }

    coordinator.shutdown().expect("clean shutdown");

    // No loss and no duplication.
    let mut flushed = sink.flushed();
    flushed.sort_unstable();
    let mut expected: Vec<u64> = (0..8u64)
        .flat_map(|p| (0..250u64).map(move |i| p * 1_000 + i))
        .collect();
    expected.sort_unstable();
    assert_eq!(flushed, expected);

    for batch in sink.batches() {
        assert!(!batch.is_empty() && batch.len() <= 16, "bad batch size {}", batch.len());
    }
}

#[test]
fn test_single_shard_batches_partition_submissions_in_order() {
    let sink = RecordingSink::new();
    let coordinator = BatchCoordinator::new(BatchConfig::new(3, 1), sink.clone()).unwrap();

    let handles: Vec<_> = (1..=7).map(|i| coordinator.submit(i)).collect();
    for (handle, expected) in handles.into_iter().zip(1..=7) {
        assert_eq!(handle.wait().unwrap(), expected);
    }
    coordinator.shutdown().unwrap();

    let batches = sink.batches();
    assert!(batches.iter().all(|b| (1..=3).contains(&b.len())));
    assert_eq!(batches.concat(), (1..=7).collect::<Vec<_>>());
    assert!(batches.len() >= 3);
}

#[tokio::test]
async fn test_failed_batch_rejects_only_its_tickets() {
    let sink = RecordingSink::new().failing_first(1);
    let coordinator = BatchCoordinator::new(BatchConfig::new(3, 1), sink.clone()).unwrap();

    match coordinator.submit(1).await {
        Err(BatchError::Sink(failure)) => {
            let injected = failure
                .downcast_ref::<InjectedFailure>()
                .expect("injected error is preserved");
            assert_eq!(injected.0, 0);
        }
        other => panic!("expected sink failure, got {other:?}"),
    }

    let later = coordinator.submit(2).await;
    assert_eq!(later.unwrap(), 2);
    assert_eq!(sink.calls(), 2);
    assert_eq!(sink.flushed(), vec![2]);
}

#[test]
fn test_bounded_queue_pushes_back_on_submitters() {
    let entered = Arc::new(AtomicBool::new(false));
    let release = Arc::new(AtomicBool::new(false));
    let sink = {
        let entered = Arc::clone(&entered);
        let release = Arc::clone(&release);
        from_fn(move |batch: &mut [WorkTicket<u64, u64>]| {
            entered.store(true, Ordering::SeqCst);
            while !release.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(1));
            }
            for ticket in batch.iter_mut() {
                let value = *ticket.payload();
                ticket.resolve(value);
            }
            Ok(())
        })
    };
    let config = BatchConfig::new(1, 1).with_queue_capacity(1);
    let coordinator = Arc::new(BatchCoordinator::new(config, sink).unwrap());

    // The worker holds the first ticket inside the sink.
    let first = coordinator.submit(0);
    while !entered.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(1));
    }

    let second = coordinator.try_submit(1).expect("one slot free");
    match coordinator.try_submit(2) {
        Err(PutError::Full(payload)) => assert_eq!(payload, 2),
        other => panic!("expected full, got {:?}", other.map(|_| ())),
    }
    assert_eq!(coordinator.pending(), 1);

    let blocked = {
        let coordinator = Arc::clone(&coordinator);
        std::thread::spawn(move || coordinator.submit(3).wait())
    };
    std::thread::sleep(Duration::from_millis(20));
    assert!(!blocked.is_finished());

    release.store(true, Ordering::SeqCst);
    assert_eq!(first.wait().unwrap(), 0);
    assert_eq!(second.wait().unwrap(), 1);
    assert_eq!(blocked.join().unwrap().unwrap(), 3);
    coordinator.shutdown().unwrap();
}

#[tokio::test]
async fn test_dropping_coordinator_still_flushes_queued_work() {
    let sink = RecordingSink::new().with_delay(Duration::from_millis(5));
    let coordinator = BatchCoordinator::new(BatchConfig::new(2, 1), sink.clone()).unwrap();
    let handles: Vec<_> = (0..6).map(|i| coordinator.submit(i)).collect();
    drop(coordinator);

    let results = join_all(handles).await;
    assert!(results.iter().all(Result::is_ok));
    assert!(wait_for(Duration::from_secs(2), || sink.flushed().len() == 6).await);
}
