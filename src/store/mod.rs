//! Store Module
//!
//! Boundary capabilities for the persistent backing store.
//!
//! A [`ConnectionSource`] opens, resets and health-checks connections; each
//! open connection is a [`Store`] that can put, get and delete keys. The
//! connection pool only ever sees these two traits.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::{MemoryCounters, MemorySource};
#[cfg(feature = "postgres")]
pub use postgres::PostgresSource;

// == Store Error ==
/// Failure reported by a backing store or connection source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Opening or re-opening a connection failed
    #[error("connection failed: {0}")]
    Connect(String),

    /// The store rejected or failed the operation
    #[error("store operation failed: {0}")]
    Backend(String),

    /// The store did not answer within the configured bound
    #[error("store operation timed out after {0:?}")]
    TimedOut(Duration),
}

/// Convenience Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Store ==
/// One live connection to the backing store.
///
/// `get` returns `Ok(None)` when the key is absent; errors are reserved for
/// the store failing the operation. Deleting an absent key succeeds.
#[async_trait]
pub trait Store: Send {
    async fn put(&mut self, key: &str, value: &str) -> StoreResult<()>;

    async fn get(&mut self, key: &str) -> StoreResult<Option<String>>;

    async fn delete(&mut self, key: &str) -> StoreResult<()>;

    /// Cheap liveness check used by the pool at acquisition time.
    async fn ping(&mut self) -> bool;
}

// == Connection Source ==
/// Factory for store connections, consulted by the pool.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    /// Opens a fresh connection.
    async fn open(&self) -> StoreResult<Box<dyn Store>>;

    /// Attempts to bring a suspect connection back to a usable state.
    async fn reset(&self, conn: &mut Box<dyn Store>) -> StoreResult<()>;

    /// Reports whether a connection can be trusted to serve a request.
    async fn is_healthy(&self, conn: &mut dyn Store) -> bool {
        conn.ping().await
    }

    /// Short human-readable name used in log lines.
    fn describe(&self) -> &str;
}
