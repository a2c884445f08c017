// Workpool - bounded worker pool with idle-worker dispatch
//
// This crate provides a fixed-size pool of asynchronous workers that consume
// jobs from a bounded queue. Workers advertise their availability through an
// idle queue, a single dispatcher matches queued jobs to idle workers in
// submission order, and job failures are isolated so one misbehaving job
// never takes down the pool.

pub mod config;
pub mod error;
pub mod job;
pub mod logging;
pub mod pool;
mod worker;

// Re-export commonly used types
pub use config::PoolConfig;
pub use error::PoolError;
pub use job::{Job, JobArg, WorkFn};
pub use pool::{PoolMetrics, WorkPool};
