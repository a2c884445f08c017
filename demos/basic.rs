// Minimal work pool usage: submit a batch of jobs, wait for the pool to
// drain, then shut it down.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use workpool::{Job, PoolConfig, WorkPool, logging};

#[tokio::main]
async fn main() -> Result<(), workpool::PoolError> {
    logging::init_default();

    let pool = WorkPool::new(PoolConfig::new(4, "demo").with_queue_capacity(16))?;
    let completed = Arc::new(AtomicUsize::new(0));

    for i in 0..12usize {
        let completed = completed.clone();
        pool.submit(Job::new(
            move |mut args| {
                let i = *args.remove(0).downcast::<usize>().unwrap();
                tracing::info!("job {} done", i);
                completed.fetch_add(1, Ordering::SeqCst);
            },
            vec![Box::new(i)],
        ))
        .await?;
    }

    // wait_finish is a latency hint; poll is_finished for certainty.
    while !pool.is_finished() {
        pool.wait_finish().await;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;

    tracing::info!(
        completed = completed.load(Ordering::SeqCst),
        idle = pool.idle_worker_count(),
        "draining complete"
    );

    pool.shutdown().await?;
    Ok(())
}
