//! kvfront - A cache-aside key-value service
//!
//! A fixed-capacity LRU cache in front of a persistent store reached through
//! a bounded connection pool. Reads are served from the cache when possible;
//! writes and deletes go to the store first and then update or invalidate
//! the cache.

pub mod api;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pool;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorConfig, ReadOutcome, ValueSource};
pub use tasks::spawn_pool_monitor;
