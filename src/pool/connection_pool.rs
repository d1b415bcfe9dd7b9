//! Connection Pool
//!
//! Bounded pool of store connections shared by all request handlers.
//!
//! Availability is tracked by a semaphore whose permits equal the number of
//! idle connections. A waiter parks on the semaphore; checking a connection
//! in pushes it onto the idle queue and adds a single permit, which wakes the
//! longest-waiting acquirer and nobody else.
//!
//! The idle queue's lock also guards every change to the `open` and `leased`
//! counters, so a [`PoolStatus`] always satisfies `available + leased == open`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::lease::{PoolConnection, PooledConnection};
use super::{PoolError, ResetPolicy};
use crate::store::ConnectionSource;

// == Pool Config ==
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of connections opened at construction
    pub size: usize,
    /// Handling of connections whose reset fails
    pub on_reset_failure: ResetPolicy,
}

impl PoolConfig {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            on_reset_failure: ResetPolicy::default(),
        }
    }

    pub fn with_reset_policy(mut self, policy: ResetPolicy) -> Self {
        self.on_reset_failure = policy;
        self
    }
}

// == Pool Status ==
/// Point-in-time view of the pool's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Connections requested at construction
    pub configured: usize,
    /// Connections currently in circulation (available + leased)
    pub open: usize,
    /// Connections idle in the queue
    pub available: usize,
    /// Connections held by a lease
    pub leased: usize,
    /// Connections ever opened, replacements included
    pub created: u64,
    /// Reset attempts on unhealthy connections
    pub resets: u64,
    /// Reset attempts that failed
    pub reset_failures: u64,
    /// Connections closed and taken out of circulation
    pub discarded: u64,
    pub on_reset_failure: ResetPolicy,
}

// == Shared State ==
pub(crate) struct PoolShared {
    source: Arc<dyn ConnectionSource>,
    idle: Mutex<VecDeque<PoolConnection>>,
    permits: Semaphore,
    policy: ResetPolicy,
    configured: usize,
    open: AtomicUsize,
    leased: AtomicUsize,
    next_id: AtomicUsize,
    created: AtomicU64,
    resets: AtomicU64,
    reset_failures: AtomicU64,
    discarded: AtomicU64,
}

impl PoolShared {
    /// Puts a leased connection back and wakes one waiter.
    pub(crate) fn check_in(&self, conn: PoolConnection) {
        debug!(connection = conn.id, suspect = conn.suspect, "Connection released");
        {
            let mut idle = self.idle.lock();
            idle.push_back(conn);
            self.leased.fetch_sub(1, Ordering::SeqCst);
        }
        self.permits.add_permits(1);
    }

    /// Closes a leased connection for good.
    pub(crate) fn discard(&self, conn: PoolConnection) {
        warn!(connection = conn.id, "Discarding connection");
        drop(conn);
        let remaining = {
            let _idle = self.idle.lock();
            self.leased.fetch_sub(1, Ordering::SeqCst);
            self.open.fetch_sub(1, Ordering::SeqCst) - 1
        };
        self.discarded.fetch_add(1, Ordering::Relaxed);
        if remaining == 0 {
            error!("Connection pool has no connections left");
            self.permits.close();
        }
    }
}

// == Connection Pool ==
/// Fixed-size pool handing out exclusive leases on store connections.
///
/// Cloning is cheap and shares the same pool.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

impl ConnectionPool {
    // == Constructor ==
    /// Opens `config.size` connections from `source`.
    ///
    /// Individual open failures are logged and tolerated; the pool runs with
    /// however many connections succeeded. Fails only if none did.
    pub async fn connect<S>(source: S, config: PoolConfig) -> Result<Self, PoolError>
    where
        S: ConnectionSource + 'static,
    {
        let mut idle = VecDeque::with_capacity(config.size);
        for id in 0..config.size {
            match source.open().await {
                Ok(store) => idle.push_back(PoolConnection::new(id, store)),
                Err(e) => warn!(connection = id, "Failed to open {} connection: {}", source.describe(), e),
            }
        }

        let opened = idle.len();
        if opened == 0 {
            error!("Could not open any of {} {} connections", config.size, source.describe());
            return Err(PoolError::Startup {
                configured: config.size,
            });
        }
        if opened < config.size {
            warn!("Connection pool degraded: {}/{} connections open", opened, config.size);
        }
        info!(
            "Connection pool ready: {} {} connections, on_reset_failure={}",
            opened,
            source.describe(),
            config.on_reset_failure
        );

        Ok(Self {
            shared: Arc::new(PoolShared {
                source: Arc::new(source),
                idle: Mutex::new(idle),
                permits: Semaphore::new(opened),
                policy: config.on_reset_failure,
                configured: config.size,
                open: AtomicUsize::new(opened),
                leased: AtomicUsize::new(0),
                next_id: AtomicUsize::new(config.size),
                created: AtomicU64::new(opened as u64),
                resets: AtomicU64::new(0),
                reset_failures: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
            }),
        })
    }

    // == Acquire ==
    /// Waits, without bound, for a connection.
    ///
    /// Fails only if every connection has been discarded.
    pub async fn acquire(&self) -> Result<PooledConnection, PoolError> {
        loop {
            let permit = self
                .shared
                .permits
                .acquire()
                .await
                .map_err(|_| PoolError::Exhausted)?;
            permit.forget();

            if let Some(lease) = self.checkout().await? {
                return Ok(lease);
            }
        }
    }

    /// Waits at most `timeout` for a usable connection.
    ///
    /// The deadline covers the whole acquisition: waiting for an idle
    /// connection and then validating, resetting or replacing it. Returns
    /// [`PoolError::Timeout`] when it passes. A connection abandoned
    /// mid-reset goes back to the pool still marked suspect.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<PooledConnection, PoolError> {
        match tokio::time::timeout(timeout, self.acquire()).await {
            Ok(acquired) => acquired,
            Err(_) => {
                debug!("No usable connection within {:?}", timeout);
                Err(PoolError::Timeout(timeout))
            }
        }
    }

    /// Takes an idle connection under a freshly forgotten permit and
    /// validates it. `None` means the connection was discarded.
    async fn checkout(&self) -> Result<Option<PooledConnection>, PoolError> {
        let conn = {
            let mut idle = self.shared.idle.lock();
            let conn = idle.pop_front();
            if conn.is_some() {
                self.shared.leased.fetch_add(1, Ordering::SeqCst);
            }
            conn
        };
        // Permits never outnumber idle connections.
        let Some(conn) = conn else {
            return Err(PoolError::Exhausted);
        };

        // From here on the lease owns the connection, so a cancelled
        // acquire still checks it back in.
        let lease = PooledConnection::new(conn, Arc::clone(&self.shared));
        Ok(self.validate(lease).await)
    }

    // == Health Validation ==
    async fn validate(&self, mut lease: PooledConnection) -> Option<PooledConnection> {
        let shared = &self.shared;
        {
            let conn = lease.slot();
            if !conn.suspect && shared.source.is_healthy(conn.store.as_mut()).await {
                return Some(lease);
            }

            warn!(connection = conn.id, "Connection failed health check, resetting");
            conn.suspect = true;
            shared.resets.fetch_add(1, Ordering::Relaxed);
            match shared.source.reset(&mut conn.store).await {
                Ok(()) => {
                    info!(connection = conn.id, "Connection reset");
                    conn.suspect = false;
                    return Some(lease);
                }
                Err(e) => {
                    shared.reset_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(connection = conn.id, "Connection reset failed: {}", e);
                }
            }
        }

        match shared.policy {
            ResetPolicy::ReturnAnyway => {
                warn!(connection = lease.id(), "Handing out unhealthy connection");
                Some(lease)
            }
            ResetPolicy::DiscardAndShrink => {
                lease.discard();
                None
            }
            ResetPolicy::DiscardAndReplace => match shared.source.open().await {
                Ok(store) => {
                    let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
                    let conn = lease.slot();
                    info!(connection = id, replaces = conn.id, "Opened replacement connection");
                    conn.id = id;
                    conn.store = store;
                    conn.suspect = false;
                    shared.created.fetch_add(1, Ordering::Relaxed);
                    Some(lease)
                }
                Err(e) => {
                    warn!("Replacement connection failed to open: {}", e);
                    lease.discard();
                    None
                }
            },
        }
    }

    // == Status ==
    pub fn status(&self) -> PoolStatus {
        let s = &self.shared;
        let (open, available, leased) = {
            let idle = s.idle.lock();
            (
                s.open.load(Ordering::SeqCst),
                idle.len(),
                s.leased.load(Ordering::SeqCst),
            )
        };
        PoolStatus {
            configured: s.configured,
            open,
            available,
            leased,
            created: s.created.load(Ordering::Relaxed),
            resets: s.resets.load(Ordering::Relaxed),
            reset_failures: s.reset_failures.load(Ordering::Relaxed),
            discarded: s.discarded.load(Ordering::Relaxed),
            on_reset_failure: s.policy,
        }
    }

    /// Number of connections requested at construction.
    pub fn size(&self) -> usize {
        self.shared.configured
    }
}
