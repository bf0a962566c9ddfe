//! List store abstraction
//!
//! The queue never touches list contents itself. Every state transition
//! is one of the atomic list primitives below, executed by the store.
//! Lists have a left end and a right end; items enter `waiting` on the
//! left and leave it on the right.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::error::QueueResult;
use std::time::Duration;

/// Atomic list primitives required by the queue
#[async_trait::async_trait]
pub trait ListStore: Send + Sync {
    /// Insert `value` at the left end of `key`
    async fn push_left(&self, key: &str, value: &str) -> QueueResult<()>;

    /// Insert `value` at the right end of `key`
    async fn push_right(&self, key: &str, value: &str) -> QueueResult<()>;

    /// Atomically pop the right end of `src` and push it on the left of `dst`,
    /// waiting for an element. `None` waits forever.
    async fn blocking_move_right_to_left(
        &self,
        src: &str,
        dst: &str,
        timeout: Option<Duration>,
    ) -> QueueResult<Option<String>>;

    /// Same move without waiting. `None` when `src` is empty.
    async fn move_right_to_left(&self, src: &str, dst: &str) -> QueueResult<Option<String>>;

    /// Remove one occurrence of `value` from `key`, returning how many were removed
    async fn remove_one(&self, key: &str, value: &str) -> QueueResult<u64>;

    /// Length of the list at `key`
    async fn len(&self, key: &str) -> QueueResult<u64>;

    /// Full contents of `key`, left to right
    async fn range(&self, key: &str) -> QueueResult<Vec<String>>;

    /// Delete `key`
    async fn delete(&self, key: &str) -> QueueResult<()>;

    /// Release the connection. Later calls on this handle fail with `Closed`.
    async fn close(&self) -> QueueResult<()>;
}
