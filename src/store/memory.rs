//! In-process list store
//!
//! Mirrors the Redis list semantics the queue relies on, with every
//! primitive executed under one lock so each call is atomic. Useful for
//! tests and for embedding a queue in a single process.
//!
//! Cloning a `MemoryStore` opens another "connection" to the same lists,
//! the way two processes would share one Redis server. Each clone is
//! closed on its own.

use crate::error::{QueueError, QueueResult};
use crate::store::ListStore;

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Default)]
struct Shared {
    lists: Mutex<HashMap<String, VecDeque<String>>>,
    /// Woken on every push and every close so blocked moves can recheck
    pushed: Notify,
}

/// List store held in memory
pub struct MemoryStore {
    shared: Arc<Shared>,
    closed: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryStore {
    /// New open handle onto the same lists, whatever the state of `self`
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            closed: AtomicBool::new(false),
        }
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            closed: AtomicBool::new(false),
        }
    }

    fn check_open(&self) -> QueueResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(QueueError::Closed)
        } else {
            Ok(())
        }
    }

    fn push(&self, key: &str, value: &str, left: bool) -> QueueResult<()> {
        self.check_open()?;
        {
            let mut lists = self.shared.lists.lock();
            let list = lists.entry(key.to_string()).or_default();
            if left {
                list.push_front(value.to_string());
            } else {
                list.push_back(value.to_string());
            }
        }
        self.shared.pushed.notify_waiters();
        Ok(())
    }

    fn try_move(&self, src: &str, dst: &str) -> Option<String> {
        let mut lists = self.shared.lists.lock();
        let value = lists.get_mut(src)?.pop_back()?;
        if lists.get(src).is_some_and(VecDeque::is_empty) {
            lists.remove(src);
        }
        lists
            .entry(dst.to_string())
            .or_default()
            .push_front(value.clone());
        Some(value)
    }
}

#[async_trait::async_trait]
impl ListStore for MemoryStore {
    async fn push_left(&self, key: &str, value: &str) -> QueueResult<()> {
        self.push(key, value, true)
    }

    async fn push_right(&self, key: &str, value: &str) -> QueueResult<()> {
        self.push(key, value, false)
    }

    async fn blocking_move_right_to_left(
        &self,
        src: &str,
        dst: &str,
        timeout: Option<Duration>,
    ) -> QueueResult<Option<String>> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            self.check_open()?;

            // Register interest before checking so a push in between is not missed
            let pushed = self.shared.pushed.notified();

            if let Some(value) = self.try_move(src, dst) {
                // dst grew
                self.shared.pushed.notify_waiters();
                return Ok(Some(value));
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, pushed).await.is_err() {
                        return Ok(None);
                    }
                }
                None => pushed.await,
            }
        }
    }

    async fn move_right_to_left(&self, src: &str, dst: &str) -> QueueResult<Option<String>> {
        self.check_open()?;
        let moved = self.try_move(src, dst);
        if moved.is_some() {
            self.shared.pushed.notify_waiters();
        }
        Ok(moved)
    }

    async fn remove_one(&self, key: &str, value: &str) -> QueueResult<u64> {
        self.check_open()?;
        let mut lists = self.shared.lists.lock();
        let Some(list) = lists.get_mut(key) else {
            return Ok(0);
        };
        let Some(pos) = list.iter().position(|item| item == value) else {
            return Ok(0);
        };
        list.remove(pos);
        if list.is_empty() {
            lists.remove(key);
        }
        Ok(1)
    }

    async fn len(&self, key: &str) -> QueueResult<u64> {
        self.check_open()?;
        let lists = self.shared.lists.lock();
        Ok(lists.get(key).map_or(0, |list| list.len() as u64))
    }

    async fn range(&self, key: &str) -> QueueResult<Vec<String>> {
        self.check_open()?;
        let lists = self.shared.lists.lock();
        Ok(lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, key: &str) -> QueueResult<()> {
        self.check_open()?;
        self.shared.lists.lock().remove(key);
        Ok(())
    }

    async fn close(&self) -> QueueResult<()> {
        self.closed.store(true, Ordering::Release);
        // Parked moves on this handle return Closed; others go back to waiting
        self.shared.pushed.notify_waiters();
        Ok(())
    }
}
