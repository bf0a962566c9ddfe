//! Error types for redq
//!
//! Three kinds of failure reach callers:
//! - Transport errors talking to the store (always propagated, never retried)
//! - `NotFound` when an ack/nack names a value that is not in flight
//! - `UnexpectedStoreState` when the shutdown drain sees anything other
//!   than an empty source; this one is fatal for the queue
//!
//! Configuration problems get their own enum so they can be reported
//! before any connection is attempted.

use thiserror::Error;

/// Errors returned by queue and store operations
#[derive(Error, Debug)]
pub enum QueueError {
    /// The value is not present in the processing list
    #[error("Value '{value}' not found in processing queue")]
    NotFound { value: String },

    /// Could not reach the store
    #[error("Failed to connect to Redis at '{url}': {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// Store command failed
    #[error("Redis error: {0}")]
    Redis(String),

    /// Store handle was already closed
    #[error("Store connection is closed")]
    Closed,

    /// Store returned something the drain cannot reason about.
    /// The queue must not be used after this.
    #[error("Unexpected store state during {operation}: {reason}")]
    UnexpectedStoreState { operation: String, reason: String },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl QueueError {
    /// True for the "already acked / never claimed" signal
    pub fn is_not_found(&self) -> bool {
        matches!(self, QueueError::NotFound { .. })
    }

    /// True when the caller should stop using this queue
    pub fn is_fatal(&self) -> bool {
        matches!(self, QueueError::UnexpectedStoreState { .. })
    }
}

impl From<redis::RedisError> for QueueError {
    fn from(err: redis::RedisError) -> Self {
        QueueError::Redis(err.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Address is empty or malformed
    #[error("Invalid Redis address '{0}'")]
    InvalidAddress(String),

    /// Prefix must not be empty
    #[error("Queue prefix must not be empty")]
    EmptyPrefix,

    /// Database index could not be parsed
    #[error("Invalid database index '{0}'")]
    InvalidDatabase(String),

    /// Poll interval of zero would block forever
    #[error("Invalid poll interval {0:?}: must be non-zero")]
    InvalidPollInterval(std::time::Duration),
}

/// Result type for queue operations
pub type QueueResult<T> = std::result::Result<T, QueueError>;
