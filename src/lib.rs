//! redq - Reliable work queue on Redis lists
//!
//! Producers enqueue string payloads; consumers claim them into a
//! processing list and either ack (drop) or nack (requeue) them. Items
//! survive consumer crashes because a claim is a single atomic move from
//! one list to the other.
//!
//! # Architecture
//!
//! ```text
//!   enqueue ──LPUSH──▶ ┌──────────────────────┐
//!                      │  {prefix}:waitingQueue│ ◀──RPUSH── nack
//!                      └──────────┬───────────┘
//!                                 │ BLMOVE RIGHT LEFT   (dequeue)
//!                                 ▼
//!                      ┌─────────────────────────┐
//!                      │ {prefix}:processingQueue │ ──LREM 1──▶ ack / nack
//!                      └──────────┬──────────────┘
//!                                 │ LMOVE RIGHT LEFT    (drain on close)
//!                                 ▼
//!                          back to waitingQueue
//! ```
//!
//! # Guarantees
//!
//! - **At-least-once**: an item leaves the store only through `ack`.
//! - **FIFO backlog**: plain enqueue/dequeue traffic is first-in first-out.
//! - **Retry first**: nacked items are redelivered before older backlog.
//! - **No client locking**: every transition is one store command; any
//!   number of handles with the same prefix can share a queue.
//!
//! # Known gap
//!
//! `nack` is two commands (remove, then push). A crash between them loses
//! that item.
//!
//! # Example
//!
//! ```rust,ignore
//! use redq::{Queue, QueueConfig};
//!
//! let queue = Queue::connect(&QueueConfig::with_addr("localhost:6379").with_prefix("jobs")).await?;
//! queue.enqueue("job-1").await?;
//!
//! if let Some(job) = queue.dequeue().await? {
//!     match handle(&job) {
//!         Ok(()) => queue.ack(&job).await?,
//!         Err(_) => queue.nack(&job).await?,
//!     }
//! }
//!
//! queue.close().await?;
//! ```

pub mod config;
pub mod error;
pub mod queue;
pub mod store;

pub use config::QueueConfig;
pub use error::{ConfigError, QueueError, QueueResult};
pub use queue::{Queue, QueueStats};
pub use store::{ListStore, MemoryStore, RedisStore};
