use std::time::Duration;

use crate::error::PoolError;

/// Configuration for a [`WorkPool`](crate::pool::WorkPool).
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Number of concurrent workers. Must be greater than zero.
    pub workers: usize,

    /// Pool name used in diagnostic logging; worker identities are
    /// `<name>-<index>`.
    pub name: String,

    /// Minimum delay a worker inserts after finishing each job, before it
    /// re-announces idleness. `Duration::ZERO` disables throttling.
    pub throttle: Duration,

    /// Maximum number of buffered, unclaimed jobs. Coerced up to at least
    /// the worker count.
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            name: "workpool".to_string(),
            throttle: Duration::ZERO,
            queue_capacity: 0,
        }
    }
}

impl PoolConfig {
    /// Creates a configuration with the given worker count and pool name,
    /// no throttle, and a queue capacity equal to the worker count.
    pub fn new(workers: usize, name: impl Into<String>) -> Self {
        Self {
            workers,
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the per-job throttle delay.
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Sets the job queue capacity. Values below the worker count are
    /// coerced up at construction time.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), PoolError> {
        if self.workers == 0 {
            return Err(PoolError::InvalidConfig(
                "worker count must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Job queue capacity after coercion: never below the worker count, so
    /// a full roster of idle workers can always be kept busy.
    pub(crate) fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.max(self.workers)
    }
}
