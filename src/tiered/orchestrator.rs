//! Tiered Cache Orchestrator
//!
//! Cascading lookup across tier 1 (in-process store), tier 2 (remote) and
//! tier 3 (loader), with promotion on the way back out.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::cache::{BoundedStore, NO_EXPIRY};
use crate::error::{CacheError, Result};
use crate::tiered::stats::{TierCounters, TierOutcome, TieredStats};
use crate::tiered::{Loader, RemoteTier};

// == Tiered Cache ==
/// Read-through/write-through cache over three tiers.
///
/// Tier-1 failures are returned to the caller. Tier-2 and loader failures
/// are logged and treated as misses.
pub struct TieredCache<V: Clone + Send + Sync + 'static> {
    l1: Arc<BoundedStore<V>>,
    l2: Option<Arc<dyn RemoteTier<V>>>,
    loader: Option<Arc<dyn Loader<V>>>,
    write_through: AtomicBool,
    write_back: Arc<AtomicBool>,
    counters: Mutex<TierCounters>,
}

impl<V: Clone + Send + Sync + 'static> TieredCache<V> {
    // == Constructor ==
    /// Wraps `l1` and installs the write-back eviction hook.
    ///
    /// Write-through starts enabled, write-back disabled.
    pub fn new(
        l1: BoundedStore<V>,
        l2: Option<Arc<dyn RemoteTier<V>>>,
        loader: Option<Arc<dyn Loader<V>>>,
    ) -> Self {
        let l1 = Arc::new(l1);
        let write_back = Arc::new(AtomicBool::new(false));

        if let Some(remote) = &l2 {
            let remote = Arc::clone(remote);
            let enabled = Arc::clone(&write_back);
            l1.set_eviction_callback(Arc::new(move |key: &str, value: &V| {
                if enabled.load(Ordering::Relaxed) {
                    demote(Arc::clone(&remote), key.to_string(), value.clone());
                }
            }));
        }

        Self {
            l1,
            l2,
            loader,
            write_through: AtomicBool::new(true),
            write_back,
            counters: Mutex::new(TierCounters::default()),
        }
    }

    /// The tier-1 store, shared with the expiry sweeper.
    pub fn l1(&self) -> &Arc<BoundedStore<V>> {
        &self.l1
    }

    pub fn has_remote(&self) -> bool {
        self.l2.is_some()
    }

    pub fn set_write_through(&self, enabled: bool) {
        self.write_through.store(enabled, Ordering::Relaxed);
    }

    pub fn set_write_back(&self, enabled: bool) {
        self.write_back.store(enabled, Ordering::Relaxed);
    }

    pub fn write_through(&self) -> bool {
        self.write_through.load(Ordering::Relaxed)
    }

    pub fn write_back(&self) -> bool {
        self.write_back.load(Ordering::Relaxed)
    }

    // == Get ==
    /// Looks a key up tier by tier. Values found below tier 1 are promoted
    /// without expiry.
    pub async fn get(&self, key: &str) -> Result<V> {
        self.lookup(key, NO_EXPIRY).await
    }

    /// Like [`get`](Self::get), but promotes and populates with `ttl`.
    pub async fn get_with_ttl(&self, key: &str, ttl: Duration) -> Result<V> {
        self.lookup(key, ttl).await
    }

    async fn lookup(&self, key: &str, ttl: Duration) -> Result<V> {
        let start = Instant::now();

        match self.l1.get(key) {
            Ok(value) => {
                self.record(TierOutcome::L1Hit, start);
                return Ok(value);
            }
            Err(err) if err.is_miss() => {}
            Err(err) => return Err(err),
        }

        if let Some(value) = self.remote_get(key).await {
            self.promote(key, value.clone(), ttl);
            self.record(TierOutcome::L2Hit, start);
            return Ok(value);
        }

        if let Some(value) = self.load(key).await {
            self.promote(key, value.clone(), ttl);
            self.remote_set(key, value.clone(), ttl).await;
            self.record(TierOutcome::L3Hit, start);
            return Ok(value);
        }

        self.record(TierOutcome::Miss, start);
        Err(CacheError::NotFound(key.to_string()))
    }

    // == Set ==
    /// Writes tier 1 (failure is returned) and, with write-through, tier 2
    /// (failure is logged).
    pub async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        if self.write_through() && self.l2.is_some() {
            self.l1.set(key, value.clone(), ttl)?;
            self.remote_set(key, value, ttl).await;
        } else {
            self.l1.set(key, value, ttl)?;
        }
        Ok(())
    }

    // == Delete ==
    /// Removes the key from every tier; per-tier failures are swallowed.
    pub async fn delete(&self, key: &str) -> Result<()> {
        if let Err(err) = self.l1.delete(key) {
            debug!(key, error = %err, "Tier-1 delete found nothing");
        }
        if let Some(remote) = &self.l2 {
            if let Err(err) = remote.delete(key).await {
                warn!(key, error = %err, "Tier-2 delete failed");
                self.counters.lock().tier2_errors += 1;
            }
        }
        Ok(())
    }

    /// Drops every tier-1 key starting with `prefix` and deletes the same
    /// keys from tier 2. Returns the removed keys.
    ///
    /// Tier 2 is not scanned, so keys held only there survive until they expire.
    pub async fn delete_prefix(&self, prefix: &str) -> Vec<String> {
        let keys = self.l1.delete_prefix(prefix);
        if let Some(remote) = &self.l2 {
            for key in &keys {
                if let Err(err) = remote.delete(key).await {
                    warn!(key = %key, error = %err, "Tier-2 delete failed");
                    self.counters.lock().tier2_errors += 1;
                }
            }
        }
        keys
    }

    // == Exists ==
    /// True if tier 1 or tier 2 holds the key. An unreachable tier 2 counts as absent.
    pub async fn exists(&self, key: &str) -> bool {
        if self.l1.exists(key) {
            return true;
        }
        match &self.l2 {
            Some(remote) => match remote.exists(key).await {
                Ok(found) => found,
                Err(err) => {
                    warn!(key, error = %err, "Tier-2 exists check failed");
                    self.counters.lock().tier2_errors += 1;
                    false
                }
            },
            None => false,
        }
    }

    // == Clear ==
    /// Empties tier 1 and tier 2.
    pub async fn clear(&self) -> Result<()> {
        self.l1.clear();
        if let Some(remote) = &self.l2 {
            if let Err(err) = remote.clear().await {
                warn!(error = %err, "Tier-2 clear failed");
                self.counters.lock().tier2_errors += 1;
            }
        }
        Ok(())
    }

    // == Batch Operations ==
    /// Resolves as many keys as possible from tier 1, then asks tier 2 once
    /// for the remainder, then the loader for whatever is still missing.
    /// Keys found nowhere are absent from the result. A key repeated in
    /// `keys` is looked up once.
    pub async fn get_multi<S: AsRef<str>>(&self, keys: &[S]) -> HashMap<String, V> {
        let mut found = HashMap::with_capacity(keys.len());
        let mut missing = Vec::new();
        let mut seen = HashSet::with_capacity(keys.len());

        for key in keys {
            let key = key.as_ref();
            if !seen.insert(key) {
                continue;
            }
            let start = Instant::now();
            match self.l1.get(key) {
                Ok(value) => {
                    self.record(TierOutcome::L1Hit, start);
                    found.insert(key.to_string(), value);
                }
                Err(_) => missing.push(key.to_string()),
            }
        }

        if missing.is_empty() {
            return found;
        }

        if let Some(remote) = &self.l2 {
            let start = Instant::now();
            match remote.get_multi(&missing).await {
                Ok(batch) => {
                    for (key, value) in batch {
                        self.promote(&key, value.clone(), NO_EXPIRY);
                        self.record(TierOutcome::L2Hit, start);
                        found.insert(key, value);
                    }
                }
                Err(err) => {
                    warn!(keys = missing.len(), error = %err, "Tier-2 batch get failed, falling back");
                    self.counters.lock().tier2_errors += 1;
                }
            }
            missing.retain(|key| !found.contains_key(key));
        }

        for key in missing {
            let start = Instant::now();
            match self.load(&key).await {
                Some(value) => {
                    self.promote(&key, value.clone(), NO_EXPIRY);
                    self.remote_set(&key, value.clone(), NO_EXPIRY).await;
                    self.record(TierOutcome::L3Hit, start);
                    found.insert(key, value);
                }
                None => self.record(TierOutcome::Miss, start),
            }
        }

        found
    }

    /// Writes every item to tier 1 (first failure is returned), then to
    /// tier 2 in one batch with write-through.
    pub async fn set_multi(&self, items: Vec<(String, V)>, ttl: Duration) -> Result<()> {
        if self.write_through() && self.l2.is_some() {
            self.l1.set_multi(items.clone(), ttl)?;
            if let Some(remote) = &self.l2 {
                if let Err(err) = remote.set_multi(items, ttl).await {
                    warn!(error = %err, "Tier-2 batch write failed");
                    self.counters.lock().tier2_errors += 1;
                }
            }
        } else {
            self.l1.set_multi(items, ttl)?;
        }
        Ok(())
    }

    // == Stats ==
    pub fn stats(&self) -> TieredStats {
        let l1 = self.l1.stats();
        self.counters.lock().snapshot(l1)
    }

    fn record(&self, outcome: TierOutcome, start: Instant) {
        let elapsed = start.elapsed();
        self.counters.lock().record(outcome, elapsed);
    }

    /// Tier-2 lookup; every outcome other than a clean hit is `None`.
    async fn remote_get(&self, key: &str) -> Option<V> {
        let remote = self.l2.as_ref()?;
        match remote.get(key).await {
            Ok(value) => Some(value),
            Err(err) if err.is_miss() => {
                debug!(key, "Tier-2 miss");
                None
            }
            Err(err) => {
                warn!(key, error = %err, "Tier-2 get failed, falling back");
                self.counters.lock().tier2_errors += 1;
                None
            }
        }
    }

    async fn remote_set(&self, key: &str, value: V, ttl: Duration) {
        if let Some(remote) = &self.l2 {
            if let Err(err) = remote.set(key, value, ttl).await {
                warn!(key, error = %err, "Tier-2 write failed");
                self.counters.lock().tier2_errors += 1;
            }
        }
    }

    async fn load(&self, key: &str) -> Option<V> {
        let loader = self.loader.as_ref()?;
        match loader.load(key).await {
            Ok(value) => Some(value),
            Err(err) if err.is_miss() => {
                debug!(key, "Loader has no value");
                None
            }
            Err(err) => {
                warn!(key, error = %err, "Loader failed");
                self.counters.lock().loader_errors += 1;
                None
            }
        }
    }

    /// Copies a value into tier 1. The caller already holds the value, so a
    /// failure here only costs a future hit.
    fn promote(&self, key: &str, value: V, ttl: Duration) {
        if let Err(err) = self.l1.set(key, value, ttl) {
            warn!(key, error = %err, "Promotion into tier 1 failed");
        }
    }
}

/// Pushes an evicted tier-1 value into tier 2 without expiry.
fn demote<V: Clone + Send + Sync + 'static>(remote: Arc<dyn RemoteTier<V>>, key: String, value: V) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(err) = remote.set(&key, value, NO_EXPIRY).await {
                    warn!(key = %key, error = %err, "Write-back to tier 2 failed");
                }
            });
        }
        Err(_) => warn!(key = %key, "No runtime available, dropping write-back"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{json_size_estimator, StoreLimits};
    use crate::tiered::{loader_fn, InMemoryRemote};
    use std::sync::atomic::AtomicUsize;

    fn l1(max_items: usize) -> BoundedStore<String> {
        BoundedStore::new(StoreLimits::new(max_items, 0), json_size_estimator())
    }

    fn remote() -> Arc<InMemoryRemote<String>> {
        Arc::new(InMemoryRemote::new(json_size_estimator()))
    }

    fn counting_loader(calls: Arc<AtomicUsize>) -> Arc<dyn Loader<String>> {
        loader_fn(move |key: String| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let value = key
                    .starts_with("db_")
                    .then(|| format!("loaded:{}", key));
                Ok::<_, anyhow::Error>(value)
            }
        })
    }

    #[tokio::test]
    async fn test_l1_only_set_and_get() {
        let cache = TieredCache::new(l1(10), None, None);

        cache.set("k", "v".to_string(), NO_EXPIRY).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), "v");
        assert!(matches!(cache.get("nope").await, Err(CacheError::NotFound(_))));
        let stats = cache.stats();
        assert_eq!(stats.l1_hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_get_with_ttl_promotes_with_ttl() {
        let remote = remote();
        remote.seed("k", "remote".to_string());
        let cache = TieredCache::new(l1(10), Some(remote.clone() as Arc<dyn RemoteTier<String>>), None);

        let value = cache
            .get_with_ttl("k", Duration::from_millis(30))
            .await
            .unwrap();
        assert_eq!(value, "remote");

        tokio::time::sleep(Duration::from_millis(60)).await;
        // Promoted copy expired; tier 2 answers again
        cache.get("k").await.unwrap();
        assert_eq!(cache.stats().l2_hits, 2);
    }

    #[tokio::test]
    async fn test_set_writes_through_to_remote() {
        let remote = remote();
        let cache = TieredCache::new(l1(10), Some(remote.clone() as Arc<dyn RemoteTier<String>>), None);

        cache.set("k", "v".to_string(), NO_EXPIRY).await.unwrap();
        assert_eq!(remote.peek("k").as_deref(), Some("v"));

        cache.set_write_through(false);
        cache.set("k2", "v2".to_string(), NO_EXPIRY).await.unwrap();
        assert!(remote.peek("k2").is_none());
    }

    #[tokio::test]
    async fn test_set_survives_remote_outage() {
        let remote = remote();
        remote.set_available(false);
        let cache = TieredCache::new(l1(10), Some(remote.clone() as Arc<dyn RemoteTier<String>>), None);

        cache.set("k", "v".to_string(), NO_EXPIRY).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), "v");
        assert_eq!(cache.stats().tier2_errors, 1);
    }

    #[tokio::test]
    async fn test_set_fails_when_tier1_rejects() {
        let store = BoundedStore::new(
            StoreLimits::new(0, 4),
            json_size_estimator::<String>(),
        );
        let remote = remote();
        let cache = TieredCache::new(store, Some(remote.clone() as Arc<dyn RemoteTier<String>>), None);

        let result = cache.set("k", "much too long".to_string(), NO_EXPIRY).await;

        assert!(matches!(result, Err(CacheError::EntryTooLarge { .. })));
        assert_eq!(remote.set_calls(), 0);
    }

    #[tokio::test]
    async fn test_remote_outage_falls_back_to_loader() {
        let remote = remote();
        remote.seed("db_a", "stale".to_string());
        remote.set_available(false);
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = TieredCache::new(
            l1(10),
            Some(remote.clone() as Arc<dyn RemoteTier<String>>),
            Some(counting_loader(calls.clone())),
        );

        assert_eq!(cache.get("db_a").await.unwrap(), "loaded:db_a");

        let stats = cache.stats();
        assert_eq!(stats.l3_hits, 1);
        assert_eq!(stats.tier2_errors, 2); // failed get + failed populate
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loader_failure_is_a_miss() {
        let loader = loader_fn(|_key: String| async move {
            Err::<Option<String>, _>(anyhow::anyhow!("connection refused"))
        });
        let cache = TieredCache::new(l1(10), None, Some(loader));

        assert!(matches!(cache.get("k").await, Err(CacheError::NotFound(_))));
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.loader_errors, 1);
    }

    #[tokio::test]
    async fn test_delete_removes_all_tiers() {
        let remote = remote();
        let cache = TieredCache::new(l1(10), Some(remote.clone() as Arc<dyn RemoteTier<String>>), None);

        cache.set("k", "v".to_string(), NO_EXPIRY).await.unwrap();
        cache.delete("k").await.unwrap();

        assert!(!cache.exists("k").await);
        assert!(remote.peek("k").is_none());
        // Nothing left to delete is still fine
        cache.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_ignores_remote_outage() {
        let remote = remote();
        let cache = TieredCache::new(l1(10), Some(remote.clone() as Arc<dyn RemoteTier<String>>), None);
        cache.set("k", "v".to_string(), NO_EXPIRY).await.unwrap();

        remote.set_available(false);
        cache.delete("k").await.unwrap();

        assert!(!cache.l1().exists("k"));
    }

    #[tokio::test]
    async fn test_exists_and_clear() {
        let remote = remote();
        remote.seed("remote_only", "r".to_string());
        let cache = TieredCache::new(l1(10), Some(remote.clone() as Arc<dyn RemoteTier<String>>), None);
        cache.set("local", "l".to_string(), NO_EXPIRY).await.unwrap();

        assert!(cache.exists("local").await);
        assert!(cache.exists("remote_only").await);
        assert!(!cache.exists("nowhere").await);

        cache.clear().await.unwrap();
        assert!(!cache.exists("local").await);
        assert!(!cache.exists("remote_only").await);
    }

    #[tokio::test]
    async fn test_write_back_demotes_evicted_entries() {
        let remote = remote();
        let cache = TieredCache::new(l1(1), Some(remote.clone() as Arc<dyn RemoteTier<String>>), None);
        cache.set_write_through(false);
        cache.set_write_back(true);

        cache.set("a", "1".to_string(), Duration::from_secs(60)).await.unwrap();
        cache.set("b", "2".to_string(), NO_EXPIRY).await.unwrap();

        // Demotion runs on a spawned task
        for _ in 0..50 {
            if remote.peek("a").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(remote.peek("a").as_deref(), Some("1"));
        assert!(remote.peek("b").is_none());
    }

    #[tokio::test]
    async fn test_write_back_disabled_by_default() {
        let remote = remote();
        let cache = TieredCache::new(l1(1), Some(remote.clone() as Arc<dyn RemoteTier<String>>), None);
        cache.set_write_through(false);

        cache.set("a", "1".to_string(), NO_EXPIRY).await.unwrap();
        cache.set("b", "2".to_string(), NO_EXPIRY).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(remote.is_empty());
        assert!(!cache.write_back());
    }

    #[tokio::test]
    async fn test_set_multi_batches_remote_write() {
        let remote = remote();
        let cache = TieredCache::new(l1(10), Some(remote.clone() as Arc<dyn RemoteTier<String>>), None);

        cache
            .set_multi(
                vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())],
                NO_EXPIRY,
            )
            .await
            .unwrap();

        assert_eq!(remote.set_calls(), 1);
        assert_eq!(remote.len(), 2);
        assert_eq!(cache.l1().len(), 2);
    }

    #[tokio::test]
    async fn test_get_multi_looks_up_repeated_keys_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let remote = remote();
        let cache = TieredCache::new(
            l1(10),
            Some(remote.clone() as Arc<dyn RemoteTier<String>>),
            Some(counting_loader(Arc::clone(&calls))),
        );
        cache.set("local", "l".to_string(), NO_EXPIRY).await.unwrap();

        let found = cache
            .get_multi(&["db_x", "local", "db_x", "local", "db_x"])
            .await;

        assert_eq!(found.len(), 2);
        assert_eq!(found.get("db_x"), Some(&"loaded:db_x".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(remote.batch_get_calls(), 1);

        let stats = cache.stats();
        assert_eq!(stats.l1_hits, 1);
        assert_eq!(stats.l3_hits, 1);
        assert_eq!(stats.total, 2);
    }

    #[tokio::test]
    async fn test_delete_prefix_clears_matching_keys_from_both_tiers() {
        let remote = remote();
        let cache = TieredCache::new(l1(10), Some(remote.clone() as Arc<dyn RemoteTier<String>>), None);
        cache.set("prices:EURUSD", "1.08".to_string(), NO_EXPIRY).await.unwrap();
        cache.set("accounts:acc-1", "a".to_string(), NO_EXPIRY).await.unwrap();

        let removed = cache.delete_prefix("prices:").await;

        assert_eq!(removed, vec!["prices:EURUSD"]);
        assert!(!cache.l1().exists("prices:EURUSD"));
        assert!(remote.peek("prices:EURUSD").is_none());
        assert_eq!(remote.peek("accounts:acc-1"), Some("a".to_string()));
    }
}
