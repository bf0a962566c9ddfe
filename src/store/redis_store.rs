//! Redis-backed list store
//!
//! Maps each primitive onto a single Redis command:
//! - `push_left` / `push_right` -> LPUSH / RPUSH
//! - `blocking_move_right_to_left` -> BLMOVE src dst RIGHT LEFT timeout
//! - `move_right_to_left` -> LMOVE src dst RIGHT LEFT
//! - `remove_one` -> LREM key 1 value
//!
//! Blocking moves run on a second connection, opened on first use and
//! kept for the life of the store. A BLMOVE parked on the shared
//! multiplexed connection would hold up every other command queued
//! behind it. Blocking moves issued concurrently through one store wait
//! on that connection in turn.
//!
//! `close` drops both connections and wakes any parked BLMOVE, which then
//! returns `Closed`. Once the socket is gone Redis no longer serves the
//! blocked client, so nothing pushed afterwards is claimed by it.

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};
use crate::store::ListStore;

use redis::{aio::MultiplexedConnection, Client};
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};

/// List store talking to a Redis server
pub struct RedisStore {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    blocking: Mutex<Option<MultiplexedConnection>>,
    closed: watch::Sender<bool>,
    url: String,
}

impl RedisStore {
    /// Connect using the address and database from `config`
    pub async fn connect(config: &QueueConfig) -> QueueResult<Self> {
        config.validate()?;
        Self::open(&config.connection_url()).await
    }

    /// Connect to a Redis URL (`redis://host:port/db`)
    pub async fn open(url: &str) -> QueueResult<Self> {
        let client = Client::open(url).map_err(|e| QueueError::ConnectionFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::ConnectionFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!("Connected to Redis at {}", url);

        let (closed, _) = watch::channel(false);
        Ok(Self {
            client,
            connection: RwLock::new(Some(connection)),
            blocking: Mutex::new(None),
            closed,
            url: url.to_string(),
        })
    }

    /// URL this store is connected to
    pub fn url(&self) -> &str {
        &self.url
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Shared connection for non-blocking commands
    async fn conn(&self) -> QueueResult<MultiplexedConnection> {
        self.connection
            .read()
            .await
            .clone()
            .ok_or(QueueError::Closed)
    }

    /// Connection reserved for blocking commands, opened on first use
    async fn blocking_conn(&self) -> QueueResult<MultiplexedConnection> {
        let mut blocking = self.blocking.lock().await;
        if self.is_closed() {
            return Err(QueueError::Closed);
        }

        if let Some(conn) = blocking.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::ConnectionFailed {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!("Opened blocking connection to {}", self.url);

        *blocking = Some(conn.clone());
        Ok(conn)
    }
}

/// BLMOVE timeout argument: seconds as a float, 0 blocks forever
fn timeout_arg(timeout: Option<Duration>) -> f64 {
    match timeout {
        Some(t) if !t.is_zero() => t.as_secs_f64(),
        // A zero duration would mean "forever" to Redis; use the smallest wait instead
        Some(_) => 0.001,
        None => 0.0,
    }
}

#[async_trait::async_trait]
impl ListStore for RedisStore {
    async fn push_left(&self, key: &str, value: &str) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        redis::cmd("LPUSH")
            .arg(key)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn push_right(&self, key: &str, value: &str) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        redis::cmd("RPUSH")
            .arg(key)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn blocking_move_right_to_left(
        &self,
        src: &str,
        dst: &str,
        timeout: Option<Duration>,
    ) -> QueueResult<Option<String>> {
        let mut closed = self.closed.subscribe();
        let mut conn = self.blocking_conn().await?;

        let mut cmd = redis::cmd("BLMOVE");
        cmd.arg(src)
            .arg(dst)
            .arg("RIGHT")
            .arg("LEFT")
            .arg(timeout_arg(timeout));

        tokio::select! {
            value = cmd.query_async::<Option<String>>(&mut conn) => Ok(value?),
            // Returning drops this clone; close() has already dropped the stored one
            _ = async {
                let _ = closed.wait_for(|closed| *closed).await;
            } => Err(QueueError::Closed),
        }
    }

    async fn move_right_to_left(&self, src: &str, dst: &str) -> QueueResult<Option<String>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = redis::cmd("LMOVE")
            .arg(src)
            .arg(dst)
            .arg("RIGHT")
            .arg("LEFT")
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn remove_one(&self, key: &str, value: &str) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        let removed: u64 = redis::cmd("LREM")
            .arg(key)
            .arg(1)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(removed)
    }

    async fn len(&self, key: &str) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        let len: u64 = redis::cmd("LLEN").arg(key).query_async(&mut conn).await?;
        Ok(len)
    }

    async fn range(&self, key: &str) -> QueueResult<Vec<String>> {
        let mut conn = self.conn().await?;
        let items: Vec<String> = redis::cmd("LRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;
        Ok(items)
    }

    async fn delete(&self, key: &str) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        redis::cmd("DEL").arg(key).query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn close(&self) -> QueueResult<()> {
        self.closed.send_replace(true);

        // Dropping the last clone of a multiplexed connection tears it down
        let shared = self.connection.write().await.take();
        let blocking = self.blocking.lock().await.take();
        if shared.is_some() || blocking.is_some() {
            tracing::debug!("Closed Redis connections to {}", self.url);
        }
        Ok(())
    }
}
