//! Cache Manager
//!
//! Namespace-aware entry point over the tiered cache. Owns the warmer and
//! the background tasks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::facade::monitor::{spawn_monitor, Thresholds};
use crate::keys::{
    cache_key, NS_ACCOUNTS, NS_POSITIONS, NS_PRICES, NS_SYMBOLS, TTL_MARKET_PRICE,
    TTL_SYMBOL_CONFIG, TTL_USER_ACCOUNT,
};
use crate::tasks::spawn_sweeper;
use crate::tiered::{TieredCache, TieredStats};
use crate::warmer::{CacheWarmer, WarmerStats, WarmupStrategy};

/// Called with the full cache key after every facade delete, or with the
/// `namespace:` prefix after a namespace invalidation.
pub type InvalidationHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Combined statistics served by the manager.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStats {
    pub cache: TieredStats,
    pub warmer: WarmerStats,
    pub invalidations: u64,
    pub last_invalidation: Option<DateTime<Utc>>,
}

// == Cache Manager ==
pub struct CacheManager<V: Clone + Send + Sync + 'static> {
    cache: Arc<TieredCache<V>>,
    warmer: Arc<CacheWarmer<V>>,
    sweep_interval: Duration,
    monitor_interval: Duration,
    thresholds: Thresholds,
    invalidations: AtomicU64,
    last_invalidation: Mutex<Option<DateTime<Utc>>>,
    on_invalidate: RwLock<Option<InvalidationHook>>,
    started: AtomicBool,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<V: Clone + Send + Sync + 'static> CacheManager<V> {
    /// Applies the write policy and warmer settings from `config`.
    pub fn new(cache: Arc<TieredCache<V>>, config: &Config) -> Self {
        cache.set_write_through(config.write_through);
        cache.set_write_back(config.write_back);

        let warmer = Arc::new(CacheWarmer::new(
            Arc::clone(&cache),
            config.refresh_interval(),
        ));
        warmer.set_enabled(config.warmup_enabled);

        Self {
            cache,
            warmer,
            sweep_interval: config.sweep_interval(),
            monitor_interval: config.monitor_interval(),
            thresholds: Thresholds::default(),
            invalidations: AtomicU64::new(0),
            last_invalidation: Mutex::new(None),
            on_invalidate: RwLock::new(None),
            started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn cache(&self) -> &Arc<TieredCache<V>> {
        &self.cache
    }

    pub fn warmer(&self) -> &Arc<CacheWarmer<V>> {
        &self.warmer
    }

    pub fn add_strategy(&self, strategy: Arc<dyn WarmupStrategy<V>>) {
        self.warmer.add_strategy(strategy);
    }

    /// Replaces the invalidation hook.
    pub fn set_on_invalidate<F>(&self, hook: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.on_invalidate.write() = Some(Arc::new(hook));
    }

    // == Namespaced Operations ==
    pub async fn get(&self, namespace: &str, key: &str) -> Result<V> {
        self.cache.get(&cache_key(namespace, key)).await
    }

    pub async fn get_with_ttl(&self, namespace: &str, key: &str, ttl: Duration) -> Result<V> {
        self.cache.get_with_ttl(&cache_key(namespace, key), ttl).await
    }

    pub async fn set(&self, namespace: &str, key: &str, value: V, ttl: Duration) -> Result<()> {
        self.cache.set(&cache_key(namespace, key), value, ttl).await
    }

    /// Removes the key from every tier and records the invalidation.
    pub async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        let full_key = cache_key(namespace, key);
        self.cache.delete(&full_key).await?;

        self.invalidations.fetch_add(1, Ordering::Relaxed);
        *self.last_invalidation.lock() = Some(Utc::now());
        debug!(key = %full_key, "Invalidated cache key");

        let hook = self.on_invalidate.read().clone();
        if let Some(hook) = hook {
            hook(&full_key);
        }
        Ok(())
    }

    /// Removes every tier-1 key in `namespace` (and the same keys from
    /// tier 2), records one invalidation and fires the hook with the
    /// namespace prefix. Returns the number of keys removed.
    pub async fn invalidate_namespace(&self, namespace: &str) -> Result<usize> {
        if namespace.is_empty() {
            return Err(CacheError::InvalidRequest(
                "namespace must not be empty".to_string(),
            ));
        }
        let prefix = cache_key(namespace, "");
        let removed = self.cache.delete_prefix(&prefix).await;

        self.invalidations.fetch_add(1, Ordering::Relaxed);
        *self.last_invalidation.lock() = Some(Utc::now());
        info!(namespace, keys = removed.len(), "Invalidated namespace");

        let hook = self.on_invalidate.read().clone();
        if let Some(hook) = hook {
            hook(&prefix);
        }
        Ok(removed.len())
    }

    /// Batched lookup within one namespace. The result is keyed by the bare
    /// keys passed in.
    pub async fn get_multi<S: AsRef<str>>(&self, namespace: &str, keys: &[S]) -> HashMap<String, V> {
        let full_keys: Vec<String> = keys
            .iter()
            .map(|key| cache_key(namespace, key.as_ref()))
            .collect();
        let mut found = self.cache.get_multi(&full_keys).await;

        keys.iter()
            .zip(full_keys.iter())
            .filter_map(|(key, full_key)| {
                found
                    .remove(full_key)
                    .map(|value| (key.as_ref().to_string(), value))
            })
            .collect()
    }

    pub async fn set_multi(
        &self,
        namespace: &str,
        items: Vec<(String, V)>,
        ttl: Duration,
    ) -> Result<()> {
        let items = items
            .into_iter()
            .map(|(key, value)| (cache_key(namespace, &key), value))
            .collect();
        self.cache.set_multi(items, ttl).await
    }

    // == Domain Helpers ==
    pub async fn get_symbol_config(&self, symbol: &str) -> Result<V> {
        self.get_with_ttl(NS_SYMBOLS, symbol, TTL_SYMBOL_CONFIG).await
    }

    pub async fn get_account(&self, account_id: &str) -> Result<V> {
        self.get_with_ttl(NS_ACCOUNTS, account_id, TTL_USER_ACCOUNT)
            .await
    }

    pub async fn get_price(&self, symbol: &str) -> Result<V> {
        self.get_with_ttl(NS_PRICES, symbol, TTL_MARKET_PRICE).await
    }

    pub async fn invalidate_price(&self, symbol: &str) -> Result<()> {
        self.delete(NS_PRICES, symbol).await
    }

    pub async fn invalidate_position(&self, position_id: &str) -> Result<()> {
        self.delete(NS_POSITIONS, position_id).await
    }

    pub async fn invalidate_account(&self, account_id: &str) -> Result<()> {
        self.delete(NS_ACCOUNTS, account_id).await
    }

    // == Lifecycle ==
    /// Runs the initial warmup, then spawns the refresh loop, the expiry
    /// sweeper and the performance monitor. A failed warmup is logged and
    /// startup continues. Calling this twice is a no-op.
    pub async fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Cache manager already started");
            return;
        }

        if let Err(err) = self.warmer.warmup().await {
            warn!(error = %err, "Initial cache warmup failed, continuing");
        }

        let handles = vec![
            self.warmer
                .spawn_periodic_refresh(self.shutdown.child_token()),
            spawn_sweeper(
                Arc::clone(self.cache.l1()),
                self.sweep_interval,
                self.shutdown.child_token(),
            ),
            spawn_monitor(
                Arc::clone(&self.cache),
                self.monitor_interval,
                self.thresholds,
                self.shutdown.child_token(),
            ),
        ];
        self.tasks.lock().extend(handles);

        info!("Cache manager started");
    }

    /// Cancels the background tasks and waits for them to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let handles = std::mem::take(&mut *self.tasks.lock());
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "Background task ended abnormally");
            }
        }

        info!("Cache manager stopped");
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            cache: self.cache.stats(),
            warmer: self.warmer.stats(),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            last_invalidation: *self.last_invalidation.lock(),
        }
    }
}
