//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::coordinator::CoordinatorConfig;
use crate::pool::{PoolConfig, ResetPolicy};

/// Default libpq-style connection string for the Postgres backend.
pub const DEFAULT_DATABASE_URL: &str = "host=localhost port=5432 user=postgres dbname=kvstore";

// == Store Backend ==
/// Which backing store the service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// Process-local table, lost on restart
    #[default]
    Memory,
    /// PostgreSQL `kv_pairs` table
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(ConfigError::Invalid {
                name: "STORE_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Memory => f.write_str("memory"),
            StoreBackend::Postgres => f.write_str("postgres"),
        }
    }
}

// == Config Error ==
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be at least 1")]
    Zero { name: &'static str },

    #[error("invalid value '{value}' for {name}")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub cache_capacity: usize,
    /// Number of store connections opened at startup
    pub pool_size: usize,
    /// Bound on waiting for a connection; `None` waits indefinitely
    pub acquire_timeout: Option<Duration>,
    /// Bound on each store call; `None` waits indefinitely
    pub store_timeout: Option<Duration>,
    /// HTTP server port
    pub server_port: u16,
    pub store_backend: StoreBackend,
    /// Connection string for the Postgres backend
    pub database_url: String,
    /// Handling of connections whose reset fails
    pub on_reset_failure: ResetPolicy,
    /// Pool monitor interval in seconds
    pub monitor_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// Unparseable numbers fall back to their defaults. An unrecognised
    /// `STORE_BACKEND` or `ON_RESET_FAILURE` is rejected.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cache entries (default: 100)
    /// - `POOL_SIZE` - Store connections (default: 8)
    /// - `ACQUIRE_TIMEOUT_MS` - Connection wait bound (default: unbounded)
    /// - `STORE_TIMEOUT_MS` - Store call bound (default: unbounded)
    /// - `SERVER_PORT` - HTTP server port (default: 8080)
    /// - `STORE_BACKEND` - `memory` or `postgres` (default: memory)
    /// - `DATABASE_URL` - Postgres connection string
    /// - `ON_RESET_FAILURE` - `return_anyway`, `discard_and_shrink` or
    ///   `discard_and_replace` (default: discard_and_replace)
    /// - `MONITOR_INTERVAL` - Pool monitor frequency in seconds (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            cache_capacity: parsed("CACHE_CAPACITY").unwrap_or(defaults.cache_capacity),
            pool_size: parsed("POOL_SIZE").unwrap_or(defaults.pool_size),
            acquire_timeout: parsed("ACQUIRE_TIMEOUT_MS").map(Duration::from_millis),
            store_timeout: parsed("STORE_TIMEOUT_MS").map(Duration::from_millis),
            server_port: parsed("SERVER_PORT").unwrap_or(defaults.server_port),
            store_backend: strict("STORE_BACKEND")?.unwrap_or(defaults.store_backend),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            on_reset_failure: strict("ON_RESET_FAILURE")?.unwrap_or(defaults.on_reset_failure),
            monitor_interval: parsed("MONITOR_INTERVAL").unwrap_or(defaults.monitor_interval),
        })
    }

    /// Rejects settings the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::Zero {
                name: "CACHE_CAPACITY",
            });
        }
        if self.pool_size == 0 {
            return Err(ConfigError::Zero { name: "POOL_SIZE" });
        }
        Ok(())
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new(self.pool_size).with_reset_policy(self.on_reset_failure)
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            acquire_timeout: self.acquire_timeout,
            store_timeout: self.store_timeout,
        }
    }
}

fn parsed<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Like [`parsed`], but a set value that does not parse is an error.
fn strict<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(None),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_capacity: 100,
            pool_size: 8,
            acquire_timeout: None,
            store_timeout: None,
            server_port: 8080,
            store_backend: StoreBackend::Memory,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            on_reset_failure: ResetPolicy::DiscardAndReplace,
            monitor_interval: 30,
        }
    }
}
