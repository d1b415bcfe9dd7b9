//! Pool Monitor Task
//!
//! Background task that periodically reports connection pool health and
//! cache occupancy.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::coordinator::Coordinator;

/// Spawns a background task that logs pool and cache state every
/// `interval_secs` seconds.
///
/// A pool running below its configured size is reported with `warn!`,
/// otherwise the report is a `debug!` line. The returned handle is aborted
/// during graceful shutdown.
pub fn spawn_pool_monitor(coordinator: Coordinator, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!("Starting pool monitor with interval of {} seconds", interval.as_secs());

        loop {
            tokio::time::sleep(interval).await;

            let pool = coordinator.pool().status();
            let cache = coordinator.cache().stats();

            if pool.open < pool.configured {
                warn!(
                    open = pool.open,
                    configured = pool.configured,
                    discarded = pool.discarded,
                    "Connection pool running degraded"
                );
            } else {
                debug!(
                    available = pool.available,
                    leased = pool.leased,
                    resets = pool.resets,
                    cache_entries = cache.total_entries,
                    hit_rate = cache.hit_rate(),
                    pending_fills = coordinator.cache().pending_fills(),
                    "Pool monitor tick"
                );
            }
        }
    })
}
