//! Remote Tier Module
//!
//! Contract for the shared tier-2 cache, plus an in-process implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{BoundedStore, SizeEstimator, StoreLimits};
use crate::error::{CacheError, Result};

// == Remote Tier ==
/// Client for the shared, possibly unavailable tier-2 store.
///
/// `get` reports a clean miss as `NotFound` and a transport or availability
/// failure as `TierUnavailable`. Callers bound calls with their own timeout;
/// dropping the future cancels the call.
#[async_trait]
pub trait RemoteTier<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<V>;

    /// `Duration::ZERO` stores without expiry.
    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    async fn clear(&self) -> Result<()>;

    /// Looks up several keys in one round-trip. Absent keys are left out.
    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, V>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            match self.get(key).await {
                Ok(value) => {
                    found.insert(key.clone(), value);
                }
                Err(err) if err.is_miss() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(found)
    }

    async fn set_multi(&self, items: Vec<(String, V)>, ttl: Duration) -> Result<()> {
        for (key, value) in items {
            self.set(&key, value, ttl).await?;
        }
        Ok(())
    }
}

// == In-Memory Remote ==
/// Tier-2 implementation backed by an unbounded in-process store.
///
/// Can be switched offline to exercise degraded paths, and counts the calls
/// it receives.
pub struct InMemoryRemote<V> {
    store: BoundedStore<V>,
    available: AtomicBool,
    get_calls: AtomicU64,
    batch_get_calls: AtomicU64,
    set_calls: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> InMemoryRemote<V> {
    pub fn new(estimator: SizeEstimator<V>) -> Self {
        Self {
            store: BoundedStore::new(StoreLimits::unbounded(), estimator),
            available: AtomicBool::new(true),
            get_calls: AtomicU64::new(0),
            batch_get_calls: AtomicU64::new(0),
            set_calls: AtomicU64::new(0),
        }
    }

    /// Simulates the remote going down or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Writes directly, bypassing availability and call counters.
    pub fn seed(&self, key: &str, value: V) {
        // Unbounded store: set cannot fail
        let _ = self.store.set(key, value, Duration::ZERO);
    }

    /// Reads directly, bypassing availability and call counters.
    pub fn peek(&self, key: &str) -> Option<V> {
        if self.store.exists(key) {
            self.store.get(key).ok()
        } else {
            None
        }
    }

    /// Single-key get calls received.
    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Batched get calls received.
    pub fn batch_get_calls(&self) -> u64 {
        self.batch_get_calls.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> u64 {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::TierUnavailable(
                "in-memory remote is offline".to_string(),
            ))
        }
    }
}

#[async_trait]
impl<V: Clone + Send + Sync + 'static> RemoteTier<V> for InMemoryRemote<V> {
    async fn get(&self, key: &str) -> Result<V> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.store.get(key).map_err(|err| match err {
            CacheError::Expired(key) => CacheError::NotFound(key),
            other => other,
        })
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.store.set(key, value, ttl)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_available()?;
        match self.store.delete(key) {
            Err(err) if err.is_miss() => Ok(()),
            other => other,
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self.store.exists(key))
    }

    async fn clear(&self) -> Result<()> {
        self.check_available()?;
        self.store.clear();
        Ok(())
    }

    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, V>> {
        self.batch_get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.store.get_multi(keys))
    }

    async fn set_multi(&self, items: Vec<(String, V)>, ttl: Duration) -> Result<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.store.set_multi(items, ttl)
    }
}
