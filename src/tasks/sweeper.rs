//! Expiry Sweeper
//!
//! Background task that periodically removes expired tier-1 entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::BoundedStore;
use crate::tasks::tick_period;

/// Spawns a task that calls [`BoundedStore::purge_expired`] every `interval`
/// until `shutdown` is cancelled. A zero interval is clamped to
/// [`MIN_TICK_PERIOD`](crate::tasks::MIN_TICK_PERIOD).
///
/// Lazy expiry on read already hides expired entries; the sweep reclaims
/// the ones nobody reads again.
///
/// # Example
/// ```ignore
/// let shutdown = CancellationToken::new();
/// let handle = spawn_sweeper(store.clone(), Duration::from_secs(10), shutdown.clone());
/// // Later, during shutdown:
/// shutdown.cancel();
/// handle.await?;
/// ```
pub fn spawn_sweeper<V>(
    store: Arc<BoundedStore<V>>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    let interval = tick_period(interval);
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting expiry sweeper");

        let mut ticker = tokio::time::interval(interval);
        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Expiry sweeper shutting down");
                    break;
                }

                _ = ticker.tick() => {
                    let removed = store.purge_expired();
                    if removed > 0 {
                        info!(removed, "Expiry sweep removed expired entries");
                    } else {
                        debug!("Expiry sweep found no expired entries");
                    }
                }
            }
        }
    })
}
