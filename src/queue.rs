//! Reliable queue over two store lists
//!
//! For a prefix `P` the queue owns exactly two keys:
//! - `P:waitingQueue`: backlog, entered on the left, consumed from the right
//! - `P:processingQueue`: items handed to a consumer and not yet acked
//!
//! Every transition between the two is a single store primitive, so an
//! item is never in both lists and never in neither. The one exception
//! is `nack`, which is a remove followed by a push: a crash between the
//! two drops the item.
//!
//! Items are identified by value. Two in-flight copies of the same value
//! cannot be told apart by `ack`/`nack`; whichever is found first goes.

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};
use crate::store::{ListStore, RedisStore};

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Role suffix for the backlog list
pub const WAITING_QUEUE: &str = "waitingQueue";

/// Role suffix for the in-flight list
pub const PROCESSING_QUEUE: &str = "processingQueue";

/// Snapshot of list lengths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Items waiting to be dequeued
    pub waiting: u64,
    /// Items dequeued but not yet acked
    pub processing: u64,
}

impl QueueStats {
    /// Items known to the queue in either list
    pub fn total(&self) -> u64 {
        self.waiting + self.processing
    }
}

/// Handle onto a named queue
pub struct Queue<S: ListStore> {
    store: S,
    prefix: String,
    waiting_key: String,
    processing_key: String,
    poll_interval: Duration,
}

impl Queue<RedisStore> {
    /// Connect to Redis and open the queue named by `config.prefix`
    pub async fn connect(config: &QueueConfig) -> QueueResult<Self> {
        let store = RedisStore::connect(config).await?;
        Ok(Self::new(store, &config.prefix).with_poll_interval(config.poll_interval))
    }
}

impl<S: ListStore> Queue<S> {
    /// Open the queue named `prefix` on `store`
    pub fn new(store: S, prefix: &str) -> Self {
        Self {
            store,
            prefix: prefix.to_string(),
            waiting_key: key_with_prefix(prefix, WAITING_QUEUE),
            processing_key: key_with_prefix(prefix, PROCESSING_QUEUE),
            poll_interval: crate::config::DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set how long `dequeue_until` waits between shutdown checks
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn waiting_key(&self) -> &str {
        &self.waiting_key
    }

    pub fn processing_key(&self) -> &str {
        &self.processing_key
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Add `value` to the back of the backlog
    pub async fn enqueue(&self, value: &str) -> QueueResult<()> {
        self.store.push_left(&self.waiting_key, value).await?;
        tracing::debug!("Enqueued '{}' on {}", value, self.waiting_key);
        Ok(())
    }

    /// Claim the oldest waiting item, blocking until one exists.
    ///
    /// The item moves to the processing list in the same store call that
    /// pops it. `Ok(None)` means the wait ended without an item (another
    /// consumer won the race) and should be treated as a no-op.
    pub async fn dequeue(&self) -> QueueResult<Option<String>> {
        self.claim(None).await
    }

    /// Like [`dequeue`](Self::dequeue) but gives up after `timeout`
    pub async fn dequeue_timeout(&self, timeout: Duration) -> QueueResult<Option<String>> {
        self.claim(Some(timeout)).await
    }

    /// Claim the next item, or return `Ok(None)` once `shutdown` is set.
    ///
    /// Waits in slices of the poll interval and checks the flag between
    /// them. Each slice is a complete store call, so stopping never
    /// leaves a claimed item that nobody received.
    pub async fn dequeue_until(&self, shutdown: &AtomicBool) -> QueueResult<Option<String>> {
        while !shutdown.load(Ordering::Relaxed) {
            if let Some(value) = self.claim(Some(self.poll_interval)).await? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    async fn claim(&self, timeout: Option<Duration>) -> QueueResult<Option<String>> {
        let value = self
            .store
            .blocking_move_right_to_left(&self.waiting_key, &self.processing_key, timeout)
            .await?;

        if let Some(ref value) = value {
            tracing::debug!("Dequeued '{}' into {}", value, self.processing_key);
        }
        Ok(value)
    }

    /// Mark `value` as done, removing one copy from the processing list
    pub async fn ack(&self, value: &str) -> QueueResult<()> {
        self.remove_processing(value).await?;
        tracing::debug!("Acked '{}'", value);
        Ok(())
    }

    /// Hand `value` back for redelivery ahead of the existing backlog.
    ///
    /// Removal and re-push are separate store calls; a crash between
    /// them loses the item. If the value is not in flight nothing is
    /// pushed and `NotFound` is returned.
    pub async fn nack(&self, value: &str) -> QueueResult<()> {
        self.remove_processing(value).await?;

        if let Err(e) = self.store.push_right(&self.waiting_key, value).await {
            tracing::error!("Failed to requeue '{}' after nack: {}", value, e);
            return Err(e);
        }

        tracing::debug!("Nacked '{}', requeued at the head of {}", value, self.waiting_key);
        Ok(())
    }

    async fn remove_processing(&self, value: &str) -> QueueResult<()> {
        let removed = self.store.remove_one(&self.processing_key, value).await?;
        if removed == 0 {
            tracing::warn!("'{}' is not in {}", value, self.processing_key);
            return Err(QueueError::NotFound {
                value: value.to_string(),
            });
        }
        Ok(())
    }

    /// Move every in-flight item back to the backlog, one atomic move at a
    /// time, and return how many were moved.
    ///
    /// Any store error is reported as `UnexpectedStoreState`; the caller
    /// should stop using the queue. Items not yet moved stay in the
    /// processing list for the next drain.
    pub async fn drain(&self) -> QueueResult<u64> {
        let mut moved = 0u64;

        loop {
            match self
                .store
                .move_right_to_left(&self.processing_key, &self.waiting_key)
                .await
            {
                Ok(Some(_)) => moved += 1,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(
                        "Drain of {} stopped after {} items: {}",
                        self.processing_key,
                        moved,
                        e
                    );
                    return Err(QueueError::UnexpectedStoreState {
                        operation: format!("drain of {}", self.processing_key),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if moved > 0 {
            tracing::info!("Returned {} in-flight items to {}", moved, self.waiting_key);
        }
        Ok(moved)
    }

    /// Drain in-flight items back to the backlog, then release the store.
    ///
    /// The store is closed even when the drain fails; the drain error is
    /// what gets returned in that case.
    pub async fn close(self) -> QueueResult<u64> {
        let drained = self.drain().await;
        let closed = self.store.close().await;
        tracing::info!("Closed queue '{}'", self.prefix);

        let moved = drained?;
        closed?;
        Ok(moved)
    }

    /// Current number of waiting items
    pub async fn waiting_len(&self) -> QueueResult<u64> {
        self.store.len(&self.waiting_key).await
    }

    /// Current number of in-flight items
    pub async fn processing_len(&self) -> QueueResult<u64> {
        self.store.len(&self.processing_key).await
    }

    /// Waiting items, next to be dequeued last
    pub async fn waiting_items(&self) -> QueueResult<Vec<String>> {
        self.store.range(&self.waiting_key).await
    }

    /// In-flight items
    pub async fn processing_items(&self) -> QueueResult<Vec<String>> {
        self.store.range(&self.processing_key).await
    }

    pub async fn stats(&self) -> QueueResult<QueueStats> {
        Ok(QueueStats {
            waiting: self.waiting_len().await?,
            processing: self.processing_len().await?,
        })
    }

    /// True when nothing is waiting or in flight
    pub async fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.stats().await?.total() == 0)
    }

    /// Delete both lists, discarding every item
    pub async fn reset(&self) -> QueueResult<()> {
        self.store.delete(&self.waiting_key).await?;
        self.store.delete(&self.processing_key).await?;
        tracing::info!("Reset queue '{}'", self.prefix);
        Ok(())
    }
}

fn key_with_prefix(prefix: &str, role: &str) -> String {
    format!("{}:{}", prefix, role)
}
