//! # Work Pool
//!
//! `WorkPool` owns the bounded job queue, the idle-worker queue, the worker
//! roster, and the shutdown/finish signaling. It is the only public control
//! surface of the crate.
//!
//! ## Data Flow
//! Callers submit [`Job`]s into the bounded job queue. A single dispatcher
//! task pulls a job and an idle worker in lock-step and delivers the job into
//! that worker's inbox. The worker executes it with failure isolation, then
//! re-announces its idleness, which also re-evaluates the finish condition.
//!
//! ## Ordering Guarantees
//! Jobs are removed from the queue in submission order (FIFO dispatch), but
//! completion order depends on which worker happens to be idle and on each
//! job's own execution time. The pool guarantees FIFO *dispatch*, not FIFO
//! *completion*.
//!
//! ## Caller Responsibilities
//! Cancellation is cooperative: a worker observes the quit signal only
//! between jobs and there is no timeout on individual job execution. A job
//! that never returns pins its worker indefinitely, reducing effective pool
//! capacity. Jobs must be well-behaved.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::job::Job;
use crate::worker::{Worker, WorkerHandle, panic_message};

/// State shared between the pool handle, the dispatcher, and all workers.
pub(crate) struct PoolShared {
    pub(crate) name: String,
    pub(crate) pool_size: usize,
    pub(crate) queue_capacity: usize,
    pub(crate) job_tx: flume::Sender<Job>,
    pub(crate) job_rx: flume::Receiver<Job>,
    pub(crate) idle_tx: flume::Sender<WorkerHandle>,
    pub(crate) idle_rx: flume::Receiver<WorkerHandle>,
    /// Transitions false to true exactly once, never reset. A watch channel
    /// rather than a bare flag so the dispatcher and submitters blocked on a
    /// full queue observe the transition without a lost-wakeup race.
    pub(crate) shutdown_tx: watch::Sender<bool>,
    pub(crate) shutdown_rx: watch::Receiver<bool>,
    /// Finish notification with at most one pending permit: an event raised
    /// while no caller is waiting occupies the single slot, and any further
    /// events are dropped until it is consumed.
    pub(crate) finish: Notify,
}

impl PoolShared {
    pub(crate) fn is_shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// The transient finished snapshot: no queued jobs and every worker idle.
    fn is_finished_now(&self) -> bool {
        self.job_rx.is_empty() && self.idle_rx.len() == self.pool_size
    }

    /// Raises a best-effort finish notification if the pool currently looks
    /// finished. Called by a worker right after it re-announces idleness; the
    /// dispatcher never emits this.
    pub(crate) fn signal_if_finished(&self) {
        if self.is_finished_now() {
            self.finish.notify_one();
        }
    }
}

/// Per-worker teardown state kept by the pool until shutdown.
struct WorkerControl {
    id: String,
    quit_tx: flume::Sender<()>,
    handle: JoinHandle<()>,
}

/// Everything consumed exactly once by the first successful shutdown.
struct Teardown {
    dispatcher: JoinHandle<()>,
    workers: Vec<WorkerControl>,
}

/// Point-in-time snapshot of pool state. All values are advisory: they can
/// change immediately after the snapshot is taken.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Number of workers in the pool.
    pub workers: usize,
    /// Workers currently waiting for an assignment.
    pub idle_workers: usize,
    /// Jobs buffered in the queue, not yet claimed by any worker.
    pub queued_jobs: usize,
    /// Total job queue capacity after coercion.
    pub queue_capacity: usize,
    /// Whether the pool has been shut down.
    pub is_shut_down: bool,
}

/// A fixed-size pool of workers consuming jobs from a bounded queue.
///
/// All workers and the dispatcher are started at construction time. The pool
/// exclusively owns its queues and workers; nothing is shared across pool
/// instances and no process-wide state is involved. Construct one pool per
/// independent workload and pass it explicitly.
///
/// Must be constructed within a tokio runtime.
pub struct WorkPool {
    shared: Arc<PoolShared>,
    teardown: Mutex<Option<Teardown>>,
}

impl WorkPool {
    /// Creates the pool and starts all workers and the dispatcher.
    ///
    /// The job queue capacity is coerced up to at least the worker count.
    /// Worker identities are `<name>-<index>`.
    ///
    /// # Errors
    /// Returns [`PoolError::InvalidConfig`] for a zero worker count.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let queue_capacity = config.effective_queue_capacity();
        let (job_tx, job_rx) = flume::bounded(queue_capacity);
        let (idle_tx, idle_rx) = flume::bounded(config.workers);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(PoolShared {
            name: config.name.clone(),
            pool_size: config.workers,
            queue_capacity,
            job_tx,
            job_rx,
            idle_tx,
            idle_rx,
            shutdown_tx,
            shutdown_rx,
            finish: Notify::new(),
        });

        let mut workers = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let id = format!("{}-{}", config.name, index);
            let (worker, quit_tx) = Worker::new(id.clone(), config.throttle);
            let handle = worker.spawn(shared.clone());
            workers.push(WorkerControl {
                id,
                quit_tx,
                handle,
            });
        }

        let dispatcher = spawn_dispatcher(shared.clone());

        info!(
            pool = %config.name,
            workers = config.workers,
            queue_capacity,
            "work pool started"
        );

        Ok(Self {
            shared,
            teardown: Mutex::new(Some(Teardown {
                dispatcher,
                workers,
            })),
        })
    }

    /// Enqueues one job, waiting if the job queue is at capacity
    /// (backpressure).
    ///
    /// # Errors
    /// Returns [`PoolError::ShutDown`] once the pool has been shut down.
    /// This is a usage error; the pool does not retry internally.
    pub async fn submit(&self, job: Job) -> Result<(), PoolError> {
        let mut shutdown_rx = self.shared.shutdown_rx.clone();
        if *shutdown_rx.borrow_and_update() {
            return Err(PoolError::ShutDown);
        }

        // A submitter parked on a full queue is woken by the shutdown
        // transition instead of blocking forever on a drained pool.
        tokio::select! {
            sent = self.shared.job_tx.send_async(job) => {
                sent.map_err(|_| PoolError::QueueClosed("job queue disconnected".to_string()))
            }
            _ = shutdown_rx.changed() => Err(PoolError::ShutDown),
        }
    }

    /// Enqueues several jobs in order, with the same semantics as
    /// [`submit`](Self::submit) for each.
    pub async fn submit_all(
        &self,
        jobs: impl IntoIterator<Item = Job>,
    ) -> Result<(), PoolError> {
        for job in jobs {
            self.submit(job).await?;
        }
        Ok(())
    }

    /// Current length of the idle queue. Advisory: the value can change
    /// immediately after this call returns.
    pub fn idle_worker_count(&self) -> usize {
        self.shared.idle_rx.len()
    }

    /// Free capacity of the job queue at the moment of the call. Advisory.
    pub fn job_queue_remaining(&self) -> usize {
        self.shared
            .queue_capacity
            .saturating_sub(self.shared.job_rx.len())
    }

    /// Whether the job queue is currently empty and every worker idle, or
    /// the pool has already been shut down (shutdown is a terminal finished
    /// state).
    ///
    /// This is a snapshot, not a guarantee that no new job will arrive
    /// concurrently from another submitter.
    pub fn is_finished(&self) -> bool {
        self.is_shut_down() || self.shared.is_finished_now()
    }

    /// Blocks until the next finish notification is observed.
    ///
    /// Even if the pool is already finished this waits for the next
    /// notification event; use [`is_finished`](Self::is_finished) first for a
    /// non-blocking check. Delivery is best-effort with a single pending
    /// slot, so repeated transient finish states can be missed: callers that
    /// need certainty should poll `is_finished` in a loop and treat this as a
    /// latency optimization only.
    pub async fn wait_finish(&self) {
        self.shared.finish.notified().await;
    }

    /// Shuts the pool down: stops the dispatcher, signals every worker to
    /// terminate, and waits for each of them to fully exit before returning.
    /// Remaining queued jobs are not drained.
    ///
    /// Shutdown is idempotent: the first call tears the pool down, any later
    /// or concurrent call is a no-op returning `Ok(())`. After shutdown every
    /// `submit` fails with [`PoolError::ShutDown`].
    pub async fn shutdown(&self) -> Result<(), PoolError> {
        let mut teardown = self.teardown.lock().await;
        let Some(Teardown {
            dispatcher,
            workers,
        }) = teardown.take()
        else {
            // Already shut down.
            return Ok(());
        };

        // Wakes the dispatcher and any submitter parked on a full queue.
        self.shared.shutdown_tx.send_replace(true);

        // Each worker gets its quit delivered individually. The quit channel
        // is buffered, so a worker mid-job picks it up once it finishes.
        for worker in &workers {
            let _ = worker.quit_tx.try_send(());
        }

        for worker in workers {
            if let Err(e) = worker.handle.await {
                error!(worker = %worker.id, "worker task failed to join: {e}");
            }
        }

        if let Err(e) = dispatcher.await {
            error!(pool = %self.shared.name, "dispatcher task failed to join: {e}");
        }

        // Release every caller parked in wait_finish; shutdown is terminal.
        self.shared.finish.notify_waiters();

        info!(pool = %self.shared.name, "work pool shut down");
        Ok(())
    }

    /// Whether the pool has been shut down. Single-writer snapshot read.
    pub fn is_shut_down(&self) -> bool {
        self.shared.is_shutting_down()
    }

    /// Pool name as given at construction.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Takes an advisory snapshot of the pool state.
    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            workers: self.shared.pool_size,
            idle_workers: self.shared.idle_rx.len(),
            queued_jobs: self.shared.job_rx.len(),
            queue_capacity: self.shared.queue_capacity,
            is_shut_down: self.is_shut_down(),
        }
    }
}

/// Launches the dispatcher loop inside a panic-isolating scope, so an
/// internal fault degrades dispatch rather than terminating the process.
fn spawn_dispatcher(shared: Arc<PoolShared>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let pool = shared.name.clone();
        if let Err(payload) = AssertUnwindSafe(dispatch_loop(shared)).catch_unwind().await {
            error!(
                pool = %pool,
                "dispatcher panicked: {}",
                panic_message(payload.as_ref())
            );
        }
    })
}

/// The sole consumer of the job queue: matches one queued job to one idle
/// worker at a time, preserving FIFO dispatch order. A job is never handed
/// to a non-idle worker. On quit, exits immediately without draining.
async fn dispatch_loop(shared: Arc<PoolShared>) {
    let mut shutdown_rx = shared.shutdown_rx.clone();

    loop {
        if *shutdown_rx.borrow_and_update() {
            break;
        }

        tokio::select! {
            job = shared.job_rx.recv_async() => {
                let Ok(job) = job else { break };
                let Ok(worker) = shared.idle_rx.recv_async().await else { break };
                if worker.inbox.send_async(job).await.is_err() {
                    // Only reachable once a worker has already quit, which
                    // means the pool is shutting down and the job is dropped.
                    warn!(worker = %worker.id, "idle worker inbox closed, dropping job");
                    break;
                }
            }
            _ = shutdown_rx.changed() => break,
        }
    }

    debug!(pool = %shared.name, "dispatcher stopped");
}
