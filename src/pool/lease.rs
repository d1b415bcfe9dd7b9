//! Connection Lease
//!
//! Scoped, exclusive borrow of one pooled connection.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::connection_pool::PoolShared;
use crate::store::Store;

// == Pool Connection ==
/// One live store connection plus its liveness flag.
pub(crate) struct PoolConnection {
    pub(crate) id: usize,
    pub(crate) store: Box<dyn Store>,
    /// Set when the connection's state cannot be trusted; the next
    /// acquirer validates and resets it before use.
    pub(crate) suspect: bool,
}

impl PoolConnection {
    pub(crate) fn new(id: usize, store: Box<dyn Store>) -> Self {
        Self {
            id,
            store,
            suspect: false,
        }
    }
}

// == Pooled Connection ==
/// A leased connection, returned to its pool exactly once when dropped.
///
/// Dereferences to the underlying [`Store`]. Dropping the lease on any path
/// (normal return, `?`, panic unwinding, a cancelled future) checks the
/// connection back in; [`release`](Self::release) just makes that explicit.
pub struct PooledConnection {
    conn: Option<PoolConnection>,
    pool: Arc<PoolShared>,
}

impl PooledConnection {
    pub(crate) fn new(conn: PoolConnection, pool: Arc<PoolShared>) -> Self {
        Self {
            conn: Some(conn),
            pool,
        }
    }

    pub(crate) fn slot(&mut self) -> &mut PoolConnection {
        // Only `Drop` and `discard` take the connection, and both consume the lease.
        self.conn.as_mut().expect("lease holds a connection until consumed")
    }

    fn slot_ref(&self) -> &PoolConnection {
        self.conn.as_ref().expect("lease holds a connection until consumed")
    }

    /// Identifier of the leased connection, stable for its lifetime.
    pub fn id(&self) -> usize {
        self.slot_ref().id
    }

    /// False when the connection failed validation and could not be reset,
    /// or was invalidated by this holder.
    pub fn is_healthy(&self) -> bool {
        !self.slot_ref().suspect
    }

    /// Marks the connection suspect. It still goes back to the pool, and the
    /// next acquirer resets it before use.
    pub fn invalidate(&mut self) {
        self.slot().suspect = true;
    }

    /// Returns the connection to the pool now.
    pub fn release(self) {}

    /// Closes the connection instead of returning it.
    pub(crate) fn discard(mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.discard(conn);
        }
    }
}

impl Deref for PooledConnection {
    type Target = dyn Store;

    fn deref(&self) -> &Self::Target {
        self.slot_ref().store.as_ref()
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.slot().store.as_mut()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.check_in(conn);
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.conn {
            Some(conn) => f
                .debug_struct("PooledConnection")
                .field("id", &conn.id)
                .field("suspect", &conn.suspect)
                .finish(),
            None => f.write_str("PooledConnection(released)"),
        }
    }
}
