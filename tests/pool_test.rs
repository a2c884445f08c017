// Integration tests for the work pool: dispatch ordering, failure isolation,
// finish detection, backpressure, and shutdown semantics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use workpool::{Job, PoolConfig, PoolError, WorkPool};

/// Polls the given condition until it holds, or panics after ~5 seconds.
async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {}", what);
}

fn recording_job(recorded: &Arc<Mutex<Vec<usize>>>, value: usize) -> Job {
    let recorded = recorded.clone();
    Job::new(
        move |mut args| {
            let value = *args.remove(0).downcast::<usize>().unwrap();
            recorded.lock().unwrap().push(value);
        },
        vec![Box::new(value)],
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn twenty_jobs_across_four_workers_run_exactly_once() {
    let pool = WorkPool::new(PoolConfig::new(4, "scenario").with_queue_capacity(10)).unwrap();
    let recorded = Arc::new(Mutex::new(Vec::new()));

    for i in 0..20 {
        pool.submit(recording_job(&recorded, i)).await.unwrap();
    }

    wait_until("all 20 jobs recorded", || recorded.lock().unwrap().len() == 20).await;
    wait_until("pool finished", || pool.is_finished()).await;

    // Every distinct value exactly once; completion order is not guaranteed.
    let mut values = recorded.lock().unwrap().clone();
    values.sort_unstable();
    assert_eq!(values, (0..20).collect::<Vec<_>>());

    assert_eq!(pool.idle_worker_count(), 4);
    pool.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_worker_preserves_submission_order() {
    let pool = WorkPool::new(PoolConfig::new(1, "fifo").with_queue_capacity(16)).unwrap();
    let recorded = Arc::new(Mutex::new(Vec::new()));

    for i in 0..10 {
        pool.submit(recording_job(&recorded, i)).await.unwrap();
    }

    wait_until("all 10 jobs recorded", || recorded.lock().unwrap().len() == 10).await;

    // With one worker, completion order equals FIFO dispatch order.
    assert_eq!(*recorded.lock().unwrap(), (0..10).collect::<Vec<_>>());
    pool.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_job_does_not_kill_its_worker() {
    let pool = WorkPool::new(PoolConfig::new(1, "isolate")).unwrap();
    let recorded = Arc::new(Mutex::new(Vec::new()));

    pool.submit(Job::new(|_args| panic!("deliberate test panic"), vec![]))
        .await
        .unwrap();
    pool.submit(recording_job(&recorded, 7)).await.unwrap();

    wait_until("follow-up job recorded", || {
        *recorded.lock().unwrap() == vec![7]
    })
    .await;
    wait_until("pool finished", || pool.is_finished()).await;

    pool.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn job_without_work_is_skipped() {
    let pool = WorkPool::new(PoolConfig::new(1, "nowork")).unwrap();
    let recorded = Arc::new(Mutex::new(Vec::new()));

    pool.submit(Job::without_work(vec![Box::new(1u8)]))
        .await
        .unwrap();
    pool.submit(recording_job(&recorded, 1)).await.unwrap();

    wait_until("follow-up job recorded", || {
        *recorded.lock().unwrap() == vec![1]
    })
    .await;

    pool.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn submit_backpressure_still_runs_every_job_once() {
    // Queue capacity equals the worker count, so submitting 40 jobs has to
    // block on a full queue along the way.
    let pool = WorkPool::new(PoolConfig::new(2, "pressure")).unwrap();
    let recorded = Arc::new(Mutex::new(Vec::new()));

    for i in 0..40 {
        pool.submit(recording_job(&recorded, i)).await.unwrap();
    }

    wait_until("all 40 jobs recorded", || recorded.lock().unwrap().len() == 40).await;

    let mut values = recorded.lock().unwrap().clone();
    values.sort_unstable();
    assert_eq!(values, (0..40).collect::<Vec<_>>());

    pool.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn metrics_reflect_capacity_coercion() {
    let pool = WorkPool::new(PoolConfig::new(4, "metrics").with_queue_capacity(1)).unwrap();

    let metrics = pool.metrics();
    assert_eq!(metrics.workers, 4);
    // Requested capacity 1 is coerced up to the worker count.
    assert_eq!(metrics.queue_capacity, 4);
    assert!(metrics.idle_workers <= 4);
    assert!(!metrics.is_shut_down);

    wait_until("all workers idle", || pool.idle_worker_count() == 4).await;
    assert_eq!(pool.job_queue_remaining(), 4);

    pool.shutdown().await.unwrap();
    assert!(pool.metrics().is_shut_down);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn throttle_paces_consecutive_jobs() {
    let pool = WorkPool::new(
        PoolConfig::new(1, "throttle").with_throttle(Duration::from_millis(50)),
    )
    .unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    for _ in 0..3 {
        let counter = counter.clone();
        pool.submit(Job::new(
            move |_args| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            vec![],
        ))
        .await
        .unwrap();
    }

    wait_until("all 3 jobs ran", || counter.load(Ordering::SeqCst) == 3).await;
    wait_until("pool finished", || pool.is_finished()).await;

    // One 50ms delay after each of the three jobs before the worker
    // re-announces idleness.
    assert!(start.elapsed() >= Duration::from_millis(150));
    pool.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn wait_finish_wakes_after_drain() {
    let pool = Arc::new(WorkPool::new(PoolConfig::new(2, "waiter")).unwrap());
    let recorded = Arc::new(Mutex::new(Vec::new()));

    let waiter_pool = pool.clone();
    let waiter = tokio::spawn(async move {
        waiter_pool.wait_finish().await;
    });

    pool.submit(recording_job(&recorded, 1)).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("wait_finish never woke")
        .unwrap();

    pool.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wait_finish_released_by_shutdown() {
    let pool = Arc::new(WorkPool::new(PoolConfig::new(1, "release")).unwrap());

    // Consume any pending startup finish permit so the waiter really parks.
    tokio::time::timeout(Duration::from_secs(5), pool.wait_finish())
        .await
        .ok();

    let waiter_pool = pool.clone();
    let waiter = tokio::spawn(async move {
        waiter_pool.wait_finish().await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    pool.shutdown().await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("shutdown did not release wait_finish")
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn submit_after_shutdown_is_rejected() {
    let pool = WorkPool::new(PoolConfig::new(2, "rejected")).unwrap();
    pool.shutdown().await.unwrap();

    assert!(pool.is_shut_down());
    // Shutdown is a terminal finished state.
    assert!(pool.is_finished());

    let result = pool.submit(Job::new(|_args| {}, vec![])).await;
    assert_eq!(result, Err(PoolError::ShutDown));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_is_idempotent() {
    let pool = WorkPool::new(PoolConfig::new(2, "twice")).unwrap();
    assert!(pool.shutdown().await.is_ok());
    assert!(pool.shutdown().await.is_ok());
    assert!(pool.is_shut_down());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_waits_for_running_job() {
    let pool = WorkPool::new(PoolConfig::new(1, "drainjob")).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    let job_counter = counter.clone();
    pool.submit(Job::new(
        move |_args| {
            std::thread::sleep(Duration::from_millis(100));
            job_counter.fetch_add(1, Ordering::SeqCst);
        },
        vec![],
    ))
    .await
    .unwrap();

    // Give the dispatcher time to hand the job to the worker.
    wait_until("job claimed", || pool.job_queue_remaining() == 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    pool.shutdown().await.unwrap();

    // A worker never observes cancellation mid-execution: the in-flight job
    // completed before shutdown returned.
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn zero_workers_is_a_construction_error() {
    let result = WorkPool::new(PoolConfig::new(0, "invalid"));
    assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
}
