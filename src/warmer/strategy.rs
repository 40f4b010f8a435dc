//! Warmup Strategies
//!
//! A strategy produces a batch of entries to push into the cache and says
//! whether it should run again on refresh ticks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::keys::{
    cache_key, NS_ACCOUNTS, NS_OHLC, NS_SYMBOLS, TTL_OHLC_HISTORICAL, TTL_SYMBOL_CONFIG,
    TTL_USER_ACCOUNT,
};

/// Whether a strategy re-runs on periodic refresh ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Re-run on every refresh tick
    Periodic,
    /// Run at warmup only
    Static,
}

/// Something that knows how to pre-populate part of the cache.
#[async_trait]
pub trait WarmupStrategy<V>: Send + Sync {
    /// Identifies the strategy in logs and failure reports.
    fn name(&self) -> &str;

    /// Produces `(cache key, value)` pairs ready to be stored.
    async fn load(&self) -> anyhow::Result<Vec<(String, V)>>;

    /// TTL the loaded entries are stored with.
    fn ttl(&self) -> Duration;

    fn refresh_policy(&self) -> RefreshPolicy;

    fn should_refresh(&self) -> bool {
        self.refresh_policy() == RefreshPolicy::Periodic
    }
}

type BatchFn<V> = dyn Fn() -> BoxFuture<'static, anyhow::Result<Vec<(String, V)>>> + Send + Sync;

// == Namespace Warmup ==
/// Loads `{key → value}` from a closure and stores it under `namespace:key`.
pub struct NamespaceWarmup<V> {
    name: String,
    namespace: String,
    ttl: Duration,
    policy: RefreshPolicy,
    batch: Arc<BatchFn<V>>,
}

impl<V: Send + 'static> NamespaceWarmup<V> {
    pub fn new<F, Fut, I>(
        name: impl Into<String>,
        namespace: impl Into<String>,
        ttl: Duration,
        policy: RefreshPolicy,
        batch: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<I>> + Send + 'static,
        I: IntoIterator<Item = (String, V)> + 'static,
    {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ttl,
            policy,
            batch: Arc::new(move || {
                batch()
                    .map(|loaded| loaded.map(|items| items.into_iter().collect::<Vec<_>>()))
                    .boxed()
            }),
        }
    }

    /// Symbol configuration: hour TTL, refreshed every tick.
    pub fn symbol_configs<F, Fut, I>(batch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<I>> + Send + 'static,
        I: IntoIterator<Item = (String, V)> + 'static,
    {
        Self::new(
            "symbol_configs",
            NS_SYMBOLS,
            TTL_SYMBOL_CONFIG,
            RefreshPolicy::Periodic,
            batch,
        )
    }

    /// Frequently used accounts: five-minute TTL, refreshed every tick.
    pub fn accounts<F, Fut, I>(batch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<I>> + Send + 'static,
        I: IntoIterator<Item = (String, V)> + 'static,
    {
        Self::new(
            "accounts",
            NS_ACCOUNTS,
            TTL_USER_ACCOUNT,
            RefreshPolicy::Periodic,
            batch,
        )
    }

    /// Historical OHLC data: day TTL, loaded once.
    pub fn ohlc_history<F, Fut, I>(batch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<I>> + Send + 'static,
        I: IntoIterator<Item = (String, V)> + 'static,
    {
        Self::new(
            "ohlc_history",
            NS_OHLC,
            TTL_OHLC_HISTORICAL,
            RefreshPolicy::Static,
            batch,
        )
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[async_trait]
impl<V: Send + 'static> WarmupStrategy<V> for NamespaceWarmup<V> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> anyhow::Result<Vec<(String, V)>> {
        let items = (self.batch)().await?;
        Ok(items
            .into_iter()
            .map(|(key, value)| (cache_key(&self.namespace, &key), value))
            .collect())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }

    fn refresh_policy(&self) -> RefreshPolicy {
        self.policy
    }
}
