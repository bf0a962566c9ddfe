//! Configuration for opening a queue handle
//!
//! Two handles share a logical queue when they point at the same Redis
//! address, database index and prefix.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Redis address
pub const DEFAULT_ADDR: &str = "127.0.0.1:6379";

/// Default key prefix
pub const DEFAULT_PREFIX: &str = "queue";

/// Default wait between shutdown-flag checks in `Queue::dequeue_until`
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Queue connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Redis address, `host:port` or a full `redis://` URL
    pub addr: String,
    /// Redis database index; wins over any `/N` path in `addr`
    pub db: i64,
    /// Namespace prefix for the list keys
    pub prefix: String,
    /// How long one blocking wait lasts before the shutdown flag is rechecked
    pub poll_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            db: 0,
            prefix: DEFAULT_PREFIX.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl QueueConfig {
    /// Create config with a custom Redis address.
    ///
    /// A database path in the address (`redis://host:6379/2`) sets `db`.
    pub fn with_addr(addr: &str) -> Self {
        let mut config = Self::default();
        config.set_addr(addr);
        config
    }

    fn set_addr(&mut self, addr: &str) {
        self.addr = addr.to_string();
        if let Some(db) = split_db(addr).1.and_then(|db| db.parse().ok()) {
            self.db = db;
        }
    }

    /// Set the key prefix
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Set the database index
    pub fn with_db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    /// Set the poll interval used by cancellable dequeues
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Build config from `REDIS_ADDR`, `REDIS_DB` and `QUEUE_PREFIX`,
    /// falling back to defaults for unset variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("REDIS_ADDR").filter(|s| !s.is_empty()) {
            config.set_addr(&addr);
        }
        if let Some(db) = lookup("REDIS_DB").filter(|s| !s.is_empty()) {
            config.db = db
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidDatabase(db.clone()))?;
        }
        if let Some(prefix) = lookup("QUEUE_PREFIX").filter(|s| !s.is_empty()) {
            config.prefix = prefix;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration before connecting
    pub fn validate(&self) -> Result<(), ConfigError> {
        let addr = self.addr.trim();
        if addr.is_empty() || addr.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidAddress(self.addr.clone()));
        }
        if let Some(path) = split_db(addr).1 {
            if path.parse::<u32>().is_err() {
                return Err(ConfigError::InvalidAddress(self.addr.clone()));
            }
        }
        if self.db < 0 {
            return Err(ConfigError::InvalidDatabase(self.db.to_string()));
        }
        if self.prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidPollInterval(self.poll_interval));
        }
        Ok(())
    }

    /// Redis connection URL with `db` as its only database path
    pub fn connection_url(&self) -> String {
        let base = split_db(&self.addr).0;
        if base.starts_with("redis://") || base.starts_with("rediss://") {
            format!("{}/{}", base, self.db)
        } else {
            format!("redis://{}/{}", base, self.db)
        }
    }
}

/// Split an address into everything up to the host and the path after it
fn split_db(addr: &str) -> (&str, Option<&str>) {
    let addr = addr.trim().trim_end_matches('/');
    let host_start = addr.find("://").map_or(0, |i| i + 3);
    match addr[host_start..].find('/') {
        Some(slash) => {
            let (base, path) = addr.split_at(host_start + slash);
            (base, Some(&path[1..]))
        }
        None => (addr, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.addr, "127.0.0.1:6379");
        assert_eq!(config.db, 0);
        assert_eq!(config.prefix, "queue");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_connection_url() {
        let config = QueueConfig::with_addr("localhost:6379").with_db(3);
        assert_eq!(config.connection_url(), "redis://localhost:6379/3");

        let config = QueueConfig::with_addr("redis://cache:6380/");
        assert_eq!(config.connection_url(), "redis://cache:6380/0");

        let config = QueueConfig::with_addr("rediss://secure:6380");
        assert_eq!(config.connection_url(), "rediss://secure:6380/0");
    }

    #[test]
    fn test_database_path_in_addr() {
        let config = QueueConfig::with_addr("redis://localhost:6379/2").with_db(2);
        assert_eq!(config.connection_url(), "redis://localhost:6379/2");

        let config = QueueConfig::with_addr("redis://localhost:6379/2");
        assert_eq!(config.db, 2);
        assert_eq!(config.connection_url(), "redis://localhost:6379/2");

        let config = QueueConfig::with_addr("redis://localhost:6379/2").with_db(5);
        assert_eq!(config.connection_url(), "redis://localhost:6379/5");

        let config = QueueConfig::with_addr("localhost:6379/4");
        assert_eq!(config.connection_url(), "redis://localhost:6379/4");
    }

    #[test]
    fn test_from_lookup_database_path() {
        let config =
            QueueConfig::from_lookup(lookup_from(&[("REDIS_ADDR", "redis://cache:6379/3")]))
                .unwrap();
        assert_eq!(config.db, 3);
        assert_eq!(config.connection_url(), "redis://cache:6379/3");

        let config = QueueConfig::from_lookup(lookup_from(&[
            ("REDIS_ADDR", "redis://cache:6379/3"),
            ("REDIS_DB", "1"),
        ]))
        .unwrap();
        assert_eq!(config.connection_url(), "redis://cache:6379/1");
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = QueueConfig::from_lookup(lookup_from(&[
            ("REDIS_ADDR", "redis-host:7000"),
            ("REDIS_DB", "2"),
            ("QUEUE_PREFIX", "jobs"),
        ]))
        .unwrap();

        assert_eq!(config.addr, "redis-host:7000");
        assert_eq!(config.db, 2);
        assert_eq!(config.prefix, "jobs");
    }

    #[test]
    fn test_prefix_may_contain_spaces() {
        let config = QueueConfig::default().with_prefix("my queue");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_empty_uses_defaults() {
        let config = QueueConfig::from_lookup(lookup_from(&[("REDIS_ADDR", "")])).unwrap();
        assert_eq!(config, QueueConfig::default());
    }

    #[test]
    fn test_from_lookup_bad_db() {
        let err = QueueConfig::from_lookup(lookup_from(&[("REDIS_DB", "zero")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidDatabase("zero".into()));
    }

    #[test]
    fn test_validate_rejects() {
        assert_eq!(
            QueueConfig::default().with_prefix("").validate(),
            Err(ConfigError::EmptyPrefix)
        );
        assert!(matches!(
            QueueConfig::with_addr(" ").validate(),
            Err(ConfigError::InvalidAddress(_))
        ));
        assert!(matches!(
            QueueConfig::with_addr("redis://cache:6379/jobs").validate(),
            Err(ConfigError::InvalidAddress(_))
        ));
        assert!(matches!(
            QueueConfig::default().with_db(-1).validate(),
            Err(ConfigError::InvalidDatabase(_))
        ));
        assert!(matches!(
            QueueConfig::default()
                .with_poll_interval(Duration::ZERO)
                .validate(),
            Err(ConfigError::InvalidPollInterval(_))
        ));
    }
}
