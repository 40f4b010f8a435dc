//! Performance Monitor
//!
//! Compares periodic stats snapshots against thresholds and warns operators.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::tasks::tick_period;
use crate::tiered::{TieredCache, TieredStats};

/// Alerting thresholds for [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Minimum acceptable hit rate across all tiers
    pub min_hit_rate: f64,
    /// Minimum acceptable tier-1 hit rate
    pub min_l1_hit_rate: f64,
    pub max_avg_latency: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_hit_rate: 0.5,
            min_l1_hit_rate: 0.3,
            max_avg_latency: Duration::from_millis(10),
        }
    }
}

/// A threshold breach found in a stats snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthWarning {
    LowHitRate { actual: f64, threshold: f64 },
    LowL1HitRate { actual: f64, threshold: f64 },
    HighLatency { actual: Duration, threshold: Duration },
}

impl fmt::Display for HealthWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthWarning::LowHitRate { actual, threshold } => write!(
                f,
                "hit rate {:.1}% below {:.1}%",
                actual * 100.0,
                threshold * 100.0
            ),
            HealthWarning::LowL1HitRate { actual, threshold } => write!(
                f,
                "tier-1 hit rate {:.1}% below {:.1}%",
                actual * 100.0,
                threshold * 100.0
            ),
            HealthWarning::HighLatency { actual, threshold } => write!(
                f,
                "average latency {:?} above {:?}",
                actual, threshold
            ),
        }
    }
}

/// Checks a snapshot against `thresholds`. Nothing fires before the first
/// lookup.
pub fn evaluate(stats: &TieredStats, thresholds: &Thresholds) -> Vec<HealthWarning> {
    let mut warnings = Vec::new();
    if stats.total == 0 {
        return warnings;
    }

    if stats.hit_rate < thresholds.min_hit_rate {
        warnings.push(HealthWarning::LowHitRate {
            actual: stats.hit_rate,
            threshold: thresholds.min_hit_rate,
        });
    }
    if stats.l1_hit_rate < thresholds.min_l1_hit_rate {
        warnings.push(HealthWarning::LowL1HitRate {
            actual: stats.l1_hit_rate,
            threshold: thresholds.min_l1_hit_rate,
        });
    }
    let latency = stats.avg_latency();
    if latency > thresholds.max_avg_latency {
        warnings.push(HealthWarning::HighLatency {
            actual: latency,
            threshold: thresholds.max_avg_latency,
        });
    }

    warnings
}

/// Spawns a task that evaluates the cache's stats every `interval` until
/// `shutdown` is cancelled. A zero interval is clamped.
pub fn spawn_monitor<V>(
    cache: Arc<TieredCache<V>>,
    interval: Duration,
    thresholds: Thresholds,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    let interval = tick_period(interval);
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting performance monitor");

        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Performance monitor shutting down");
                    break;
                }

                _ = ticker.tick() => {
                    let stats = cache.stats();
                    debug!(
                        total = stats.total,
                        hit_rate = stats.hit_rate,
                        l1_hit_rate = stats.l1_hit_rate,
                        avg_latency_ns = stats.avg_latency_ns,
                        l1_items = stats.l1_items,
                        "Cache performance snapshot"
                    );
                    for warning in evaluate(&stats, &thresholds) {
                        warn!(%warning, "Cache performance degraded");
                    }
                }
            }
        }
    })
}
