use thiserror::Error;

/// Errors surfaced by the pool's public control surface.
///
/// Job execution faults are never represented here: they are caught at the
/// worker boundary, logged, and isolated from callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Construction was attempted with unusable parameters.
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// A submission arrived after the pool was shut down.
    #[error("Pool is already shut down")]
    ShutDown,

    /// An internal channel disconnected unexpectedly.
    #[error("Internal queue closed: {0}")]
    QueueClosed(String),
}
