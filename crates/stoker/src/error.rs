//! Error taxonomy for the scheduler.
//!
//! Mirrors the kinds in the error handling design: Redis I/O failures propagate,
//! dispatcher/handler failures are captured into the failure log rather than
//! raised, and dedup rejection / lock contention are not errors at all.

use thiserror::Error;

/// Result type for scheduler operations.
pub type StokerResult<T> = Result<T, StokerError>;

#[derive(Debug, Error)]
pub enum StokerError {
    /// Any failed Store call. Propagated to the caller of the Admin or Producer
    /// API; in the Master loop it ends the current iteration (the next EXPIRE
    /// refresh will fail and the loop exits cleanly).
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Policy violation: log type outside {success, failed}, non-CLI master
    /// invocation, etc. Caller must correct.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Lock contention: the Master's SETNX lost. Not an error for the winner;
    /// the CLI maps this to a clean exit with a diagnostic message.
    #[error("another master already holds the lock for this host")]
    LockHeld,

    #[error("worker {0} was evicted")]
    WorkerEvicted(String),

    #[error("process launch failed: {0}")]
    ProcessLaunch(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StokerError {
    /// True for the one case the CLI maps to exit code 0: losing the startup
    /// race for the master lock is a normal outcome for the loser.
    pub fn is_benign_exit(&self) -> bool {
        matches!(self, StokerError::LockHeld)
    }
}
