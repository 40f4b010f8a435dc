//! Background Tasks Module
//!
//! Long-lived tasks owned by the cache manager, each stopped through a
//! `CancellationToken`.
//!
//! # Tasks
//! - Expiry sweeper: purges expired tier-1 entries at a fixed interval

mod sweeper;

use std::time::Duration;

pub use sweeper::spawn_sweeper;

/// Shortest period a background loop will tick at.
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

/// Clamps a tick period to [`MIN_TICK_PERIOD`]; `tokio::time::interval`
/// rejects a zero period.
pub fn tick_period(period: Duration) -> Duration {
    period.max(MIN_TICK_PERIOD)
}
