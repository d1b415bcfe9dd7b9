//! Connection Pool Module
//!
//! Bounded pool of store connections with blocking and timed acquisition,
//! health validation and guaranteed-release leases.

mod connection_pool;
mod lease;
mod policy;

use std::time::Duration;

use thiserror::Error;

pub use connection_pool::{ConnectionPool, PoolConfig, PoolStatus};
pub use lease::PooledConnection;
pub use policy::ResetPolicy;

// == Pool Error ==
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Not a single connection could be opened at construction
    #[error("could not open any of {configured} store connections")]
    Startup { configured: usize },

    /// No connection became available in time
    #[error("no store connection available within {0:?}")]
    Timeout(Duration),

    /// Every connection has been discarded
    #[error("connection pool has no connections left")]
    Exhausted,
}
