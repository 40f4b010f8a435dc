//! Cache Warmer
//!
//! Runs warmup strategies concurrently on startup and re-runs the periodic
//! ones on a fixed interval until cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};
use crate::tasks::tick_period;
use crate::tiered::TieredCache;
use crate::warmer::WarmupStrategy;

/// A strategy that did not complete.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyFailure {
    pub name: String,
    pub error: String,
}

// == Warmup Report ==
/// Outcome of one warmup or refresh round.
#[derive(Debug, Clone, Serialize)]
pub struct WarmupReport {
    /// Strategies attempted
    pub strategies: usize,
    /// Names of the strategies that stored their data
    pub succeeded: Vec<String>,
    pub failed: Vec<StrategyFailure>,
    /// Entries written across all successful strategies
    pub entries_loaded: usize,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl WarmupReport {
    fn empty() -> Self {
        Self {
            strategies: 0,
            succeeded: Vec::new(),
            failed: Vec::new(),
            entries_loaded: 0,
            duration_ms: 0,
            completed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Converts a report with failures into [`CacheError::WarmupFailed`].
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let details = self
            .failed
            .iter()
            .map(|f| format!("{}: {}", f.name, f.error))
            .collect::<Vec<_>>()
            .join("; ");
        Err(CacheError::WarmupFailed {
            failed: self.failed.len(),
            total: self.strategies,
            details,
        })
    }
}

/// Snapshot of the warmer's state.
#[derive(Debug, Clone, Serialize)]
pub struct WarmerStats {
    pub enabled: bool,
    pub strategies: usize,
    pub refresh_interval_secs: u64,
    pub last_warmup: Option<DateTime<Utc>>,
    pub last_warmup_duration_ms: u64,
    pub last_refresh: Option<DateTime<Utc>>,
    /// Completed refresh rounds
    pub refresh_runs: u64,
}

#[derive(Debug, Default)]
struct WarmerState {
    last_warmup: Option<DateTime<Utc>>,
    last_warmup_duration: Duration,
    last_refresh: Option<DateTime<Utc>>,
    refresh_runs: u64,
}

// == Cache Warmer ==
pub struct CacheWarmer<V: Clone + Send + Sync + 'static> {
    cache: Arc<TieredCache<V>>,
    strategies: RwLock<Vec<Arc<dyn WarmupStrategy<V>>>>,
    enabled: AtomicBool,
    refresh_interval: Mutex<Duration>,
    state: Mutex<WarmerState>,
}

impl<V: Clone + Send + Sync + 'static> CacheWarmer<V> {
    /// A zero `refresh_interval` is clamped to the minimum tick period.
    pub fn new(cache: Arc<TieredCache<V>>, refresh_interval: Duration) -> Self {
        Self {
            cache,
            strategies: RwLock::new(Vec::new()),
            enabled: AtomicBool::new(true),
            refresh_interval: Mutex::new(tick_period(refresh_interval)),
            state: Mutex::new(WarmerState::default()),
        }
    }

    pub fn add_strategy(&self, strategy: Arc<dyn WarmupStrategy<V>>) {
        debug!(strategy = strategy.name(), "Registered warmup strategy");
        self.strategies.write().push(strategy);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Takes effect when the refresh loop is next started. Zero is clamped
    /// to the minimum tick period.
    pub fn set_refresh_interval(&self, interval: Duration) {
        *self.refresh_interval.lock() = tick_period(interval);
    }

    pub fn refresh_interval(&self) -> Duration {
        *self.refresh_interval.lock()
    }

    // == Warmup ==
    /// Runs every strategy concurrently and waits for all of them.
    ///
    /// Strategies that succeed keep their data in the cache even when others
    /// fail; any failure turns the result into [`CacheError::WarmupFailed`].
    pub async fn warmup(&self) -> Result<WarmupReport> {
        if !self.is_enabled() {
            debug!("Cache warming disabled, skipping warmup");
            return Ok(WarmupReport::empty());
        }

        let strategies = self.strategies.read().clone();
        info!(strategies = strategies.len(), "Starting cache warmup");

        let start = Instant::now();
        let report = self.run(strategies).await;

        {
            let mut state = self.state.lock();
            state.last_warmup = Some(report.completed_at);
            state.last_warmup_duration = start.elapsed();
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            entries = report.entries_loaded,
            duration_ms = report.duration_ms,
            "Cache warmup completed"
        );
        report.into_result()
    }

    // == Refresh ==
    /// Re-runs the strategies whose policy asks for refresh. Failures are
    /// logged and the strategy is tried again next round.
    pub async fn refresh_once(&self) -> WarmupReport {
        let strategies: Vec<_> = self
            .strategies
            .read()
            .iter()
            .filter(|s| s.should_refresh())
            .cloned()
            .collect();

        let report = self.run(strategies).await;

        {
            let mut state = self.state.lock();
            state.last_refresh = Some(report.completed_at);
            state.refresh_runs += 1;
        }

        debug!(
            strategies = report.strategies,
            failed = report.failed.len(),
            entries = report.entries_loaded,
            "Cache refresh round completed"
        );
        report
    }

    /// Refreshes on a fixed interval until `shutdown` is cancelled. A round
    /// already running finishes before the loop exits.
    pub async fn run_periodic_refresh(self: Arc<Self>, shutdown: CancellationToken) {
        if !self.is_enabled() {
            debug!("Cache warming disabled, refresh loop not started");
            return;
        }

        let period = self.refresh_interval();
        info!(interval_secs = period.as_secs(), "Cache refresh loop started");

        let mut interval = tokio::time::interval(period);
        // First tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Cache refresh loop shutting down");
                    break;
                }

                _ = interval.tick() => {
                    if self.is_enabled() {
                        self.refresh_once().await;
                    }
                }
            }
        }
    }

    pub fn spawn_periodic_refresh(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run_periodic_refresh(shutdown))
    }

    pub fn stats(&self) -> WarmerStats {
        let state = self.state.lock();
        WarmerStats {
            enabled: self.is_enabled(),
            strategies: self.strategies.read().len(),
            refresh_interval_secs: self.refresh_interval().as_secs(),
            last_warmup: state.last_warmup,
            last_warmup_duration_ms: state.last_warmup_duration.as_millis() as u64,
            last_refresh: state.last_refresh,
            refresh_runs: state.refresh_runs,
        }
    }

    /// One task per strategy; every task is awaited, none short-circuits.
    async fn run(&self, strategies: Vec<Arc<dyn WarmupStrategy<V>>>) -> WarmupReport {
        let start = Instant::now();
        let total = strategies.len();

        let handles: Vec<_> = strategies
            .into_iter()
            .map(|strategy| {
                let name = strategy.name().to_string();
                let cache = Arc::clone(&self.cache);
                (name, tokio::spawn(run_strategy(cache, strategy)))
            })
            .collect();

        let mut report = WarmupReport::empty();
        report.strategies = total;

        for (name, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => Err(anyhow::anyhow!("strategy task failed: {}", err)),
            };
            match outcome {
                Ok(loaded) => {
                    debug!(strategy = %name, entries = loaded, "Warmup strategy completed");
                    report.entries_loaded += loaded;
                    report.succeeded.push(name);
                }
                Err(err) => {
                    warn!(strategy = %name, error = %format!("{:#}", err), "Warmup strategy failed");
                    report.failed.push(StrategyFailure {
                        name,
                        error: format!("{:#}", err),
                    });
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        report.completed_at = Utc::now();
        report
    }
}

async fn run_strategy<V: Clone + Send + Sync + 'static>(
    cache: Arc<TieredCache<V>>,
    strategy: Arc<dyn WarmupStrategy<V>>,
) -> anyhow::Result<usize> {
    let items = strategy.load().await?;
    let loaded = items.len();
    cache.set_multi(items, strategy.ttl()).await?;
    Ok(loaded)
}
