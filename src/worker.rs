//! # Worker Execution Unit
//!
//! Each worker is a long-lived tokio task that advertises idleness through
//! the pool's idle queue, accepts exactly one job at a time through its
//! private single-slot inbox, and executes it with panic isolation.
//!
//! ## Core Algorithm
//! 1. Push a self-reference onto the idle queue (announce idle)
//! 2. Re-evaluate the pool's finish condition
//! 3. Wait for either a job on the inbox or the quit signal
//! 4. On a job: execute it inside a panic-isolating scope, then optionally
//!    sleep the configured throttle delay before re-announcing
//! 5. On quit: exit the loop permanently
//!
//! The quit signal is only observed while waiting, never mid-execution: a
//! worker that is running a job always finishes it before stopping.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error};

use crate::job::Job;
use crate::pool::PoolShared;

/// A cloneable reference to a worker, placed on the idle queue whenever the
/// worker is ready for an assignment.
pub(crate) struct WorkerHandle {
    pub(crate) id: String,
    pub(crate) inbox: flume::Sender<Job>,
}

/// One execution unit of the pool.
pub(crate) struct Worker {
    id: String,
    inbox_tx: flume::Sender<Job>,
    inbox_rx: flume::Receiver<Job>,
    quit_rx: flume::Receiver<()>,
    throttle: Duration,
}

impl Worker {
    /// Creates a worker and returns it together with the sender used to
    /// deliver its quit signal.
    pub(crate) fn new(id: String, throttle: Duration) -> (Self, flume::Sender<()>) {
        let (inbox_tx, inbox_rx) = flume::bounded(1);
        let (quit_tx, quit_rx) = flume::bounded(1);

        let worker = Self {
            id,
            inbox_tx,
            inbox_rx,
            quit_rx,
            throttle,
        };
        (worker, quit_tx)
    }

    /// Launches the worker's run loop as a tokio task.
    ///
    /// The loop itself runs inside a panic-isolating scope: an unexpected
    /// fault in the loop machinery degrades only this worker, it does not
    /// terminate the host process or the rest of the pool.
    pub(crate) fn spawn(self, shared: Arc<PoolShared>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let id = self.id.clone();
            if let Err(payload) = AssertUnwindSafe(self.run(shared)).catch_unwind().await {
                error!(
                    worker = %id,
                    "worker loop panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        })
    }

    async fn run(self, shared: Arc<PoolShared>) {
        debug!(worker = %self.id, "worker started");

        loop {
            // Announce idle. The idle queue has one slot per worker, so this
            // only fails once the pool has been torn down.
            let handle = WorkerHandle {
                id: self.id.clone(),
                inbox: self.inbox_tx.clone(),
            };
            if shared.idle_tx.send_async(handle).await.is_err() {
                break;
            }

            // Announcing idleness is the only point at which the pool can
            // transition into the finished snapshot from this worker's view.
            shared.signal_if_finished();

            tokio::select! {
                job = self.inbox_rx.recv_async() => match job {
                    Ok(job) => {
                        self.execute(job);
                        if !self.throttle.is_zero() {
                            time::sleep(self.throttle).await;
                        }
                    }
                    Err(_) => break,
                },
                _ = self.quit_rx.recv_async() => break,
            }
        }

        debug!(worker = %self.id, "worker stopped");
        // Dropping the inbox receiver here closes the inbox, so any further
        // delivery attempt fails detectably instead of blocking silently.
    }

    /// Runs a job's work function with failure isolation.
    ///
    /// Any panic raised by the work function is caught and logged with this
    /// worker's identity and a captured backtrace; it never propagates. A job
    /// without a work function is logged as a configuration error and skipped.
    fn execute(&self, job: Job) {
        let (work, args) = job.into_parts();
        let Some(work) = work else {
            error!(worker = %self.id, "job has no work function, skipping");
            return;
        };

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || work(args))) {
            let backtrace = Backtrace::force_capture();
            error!(
                worker = %self.id,
                "job panicked: {}\n{}",
                panic_message(payload.as_ref()),
                backtrace
            );
        }
    }
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    }
}
