//! Bounded Store Module
//!
//! Tier-1 cache engine combining HashMap storage with LRU tracking, TTL
//! expiration and item/size limits.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, LruTracker, StatsCounters, DEFAULT_ENTRY_SIZE};
use crate::error::{CacheError, Result};

/// Estimates the size of a value in bytes. `None` falls back to
/// [`DEFAULT_ENTRY_SIZE`].
pub type SizeEstimator<V> = Arc<dyn Fn(&V) -> Option<usize> + Send + Sync>;

/// Invoked with each entry evicted for capacity, after the store lock is released.
pub type EvictionCallback<V> = Arc<dyn Fn(&str, &V) + Send + Sync>;

/// Size estimator based on the JSON encoding length of the value.
pub fn json_size_estimator<V: Serialize>() -> SizeEstimator<V> {
    Arc::new(|value: &V| serde_json::to_vec(value).ok().map(|bytes| bytes.len()))
}

// == Store Limits ==
/// Capacity limits for a store. Zero disables a limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreLimits {
    pub max_items: usize,
    pub max_size_bytes: usize,
}

impl StoreLimits {
    pub fn new(max_items: usize, max_size_bytes: usize) -> Self {
        Self {
            max_items,
            max_size_bytes,
        }
    }

    /// No item or size limit.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// True if inserting an entry of `incoming` bytes would break a limit.
    fn needs_eviction(&self, items: usize, size_bytes: usize, incoming: usize) -> bool {
        if self.max_items > 0 && items >= self.max_items {
            return true;
        }
        self.max_size_bytes > 0 && size_bytes + incoming > self.max_size_bytes
    }
}

// == Store Internals ==
/// Everything guarded by the store lock: entries and LRU order move together.
struct StoreInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    lru: LruTracker,
    size_bytes: usize,
}

impl<V> StoreInner<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            size_bytes: 0,
        }
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        self.size_bytes = self.size_bytes.saturating_sub(entry.size);
        Some(entry)
    }

    fn evict_oldest(&mut self) -> Option<CacheEntry<V>> {
        let key = self.lru.evict_oldest()?;
        let entry = self.entries.remove(&key)?;
        self.size_bytes = self.size_bytes.saturating_sub(entry.size);
        Some(entry)
    }
}

enum Lookup<V> {
    Missing,
    Expired,
    Live(V),
}

// == Bounded Store ==
/// In-process LRU/TTL key-value store with item and size limits.
///
/// A single mutex covers the entry map and the LRU order, because even a
/// read reorders entries. Counters are atomics and never take that lock.
pub struct BoundedStore<V> {
    inner: Mutex<StoreInner<V>>,
    limits: StoreLimits,
    estimator: SizeEstimator<V>,
    on_evict: RwLock<Option<EvictionCallback<V>>>,
    stats: StatsCounters,
}

impl<V> fmt::Debug for BoundedStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedStore")
            .field("limits", &self.limits)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

impl<V: Clone> BoundedStore<V> {
    // == Constructor ==
    /// Creates a new store with the given limits and size estimator.
    pub fn new(limits: StoreLimits, estimator: SizeEstimator<V>) -> Self {
        Self {
            inner: Mutex::new(StoreInner::new()),
            limits,
            estimator,
            on_evict: RwLock::new(None),
            stats: StatsCounters::new(),
        }
    }

    /// Installs (or replaces) the eviction callback.
    pub fn set_eviction_callback(&self, callback: EvictionCallback<V>) {
        *self.on_evict.write() = Some(callback);
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    // == Get ==
    /// Retrieves a value by key and marks it most recently used.
    ///
    /// Returns `Expired` exactly once for an entry whose deadline has passed
    /// (the entry is removed), and `NotFound` afterwards.
    pub fn get(&self, key: &str) -> Result<V> {
        let start = Instant::now();
        let result = {
            let mut inner = self.inner.lock();
            let lookup = match inner.entries.get(key) {
                None => Lookup::Missing,
                Some(entry) if entry.is_expired() => Lookup::Expired,
                Some(entry) => Lookup::Live(entry.value.clone()),
            };

            match lookup {
                Lookup::Missing => Err(CacheError::NotFound(key.to_string())),
                Lookup::Expired => {
                    inner.remove_entry(key);
                    self.stats.set_occupancy(inner.entries.len(), inner.size_bytes);
                    self.stats.record_expirations(1);
                    Err(CacheError::Expired(key.to_string()))
                }
                Lookup::Live(value) => {
                    inner.lru.touch(key);
                    Ok(value)
                }
            }
        };

        match &result {
            Ok(_) => self.stats.record_hit(),
            Err(_) => self.stats.record_miss(),
        }
        self.stats.record_get_latency(start.elapsed());
        result
    }

    // == Set ==
    /// Stores a key-value pair. `Duration::ZERO` means the entry never expires.
    ///
    /// Evicts from the LRU tail until the new entry fits. Fails only when the
    /// entry alone is larger than the size limit.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) -> Result<()> {
        let start = Instant::now();
        let key = key.into();
        let size = (self.estimator)(&value).unwrap_or(DEFAULT_ENTRY_SIZE);

        if self.limits.max_size_bytes > 0 && size > self.limits.max_size_bytes {
            self.stats.record_set_latency(start.elapsed());
            return Err(CacheError::EntryTooLarge {
                key,
                size,
                limit: self.limits.max_size_bytes,
            });
        }

        let entry = CacheEntry::new(key.clone(), value, ttl, size);

        let evicted = {
            let mut inner = self.inner.lock();
            inner.remove_entry(&key);

            let mut evicted = Vec::new();
            while self
                .limits
                .needs_eviction(inner.entries.len(), inner.size_bytes, size)
            {
                match inner.evict_oldest() {
                    Some(entry) => evicted.push(entry),
                    None => break,
                }
            }

            inner.size_bytes += size;
            inner.lru.touch(&key);
            inner.entries.insert(key, entry);
            self.stats.set_occupancy(inner.entries.len(), inner.size_bytes);
            evicted
        };

        self.stats.record_set();
        self.stats.record_set_latency(start.elapsed());
        self.notify_evicted(evicted);
        Ok(())
    }

    // == Delete ==
    /// Removes an entry by key.
    pub fn delete(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.remove_entry(key).is_some() {
            self.stats.set_occupancy(inner.entries.len(), inner.size_bytes);
            self.stats.record_delete();
            Ok(())
        } else {
            Err(CacheError::NotFound(key.to_string()))
        }
    }

    /// Removes every entry whose key starts with `prefix`.
    ///
    /// Returns the removed keys. Counted as deletes, not evictions.
    pub fn delete_prefix(&self, prefix: &str) -> Vec<String> {
        let mut inner = self.inner.lock();
        let keys: Vec<String> = inner
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();

        for key in &keys {
            inner.remove_entry(key);
            self.stats.record_delete();
        }
        self.stats.set_occupancy(inner.entries.len(), inner.size_bytes);
        keys
    }

    // == Exists ==
    /// Checks for a live entry without changing its recency.
    pub fn exists(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        let expired = match inner.entries.get(key) {
            None => return false,
            Some(entry) => entry.is_expired(),
        };

        if expired {
            inner.remove_entry(key);
            self.stats.set_occupancy(inner.entries.len(), inner.size_bytes);
            self.stats.record_expirations(1);
        }
        !expired
    }

    // == Clear ==
    /// Removes every entry. Not reported as evictions.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.lru.clear();
        inner.size_bytes = 0;
        self.stats.set_occupancy(0, 0);
    }

    // == Batch Operations ==
    /// Returns the live values among `keys`; absent and expired keys are left out.
    pub fn get_multi<S: AsRef<str>>(&self, keys: &[S]) -> HashMap<String, V> {
        keys.iter()
            .filter_map(|key| {
                let key = key.as_ref();
                self.get(key).ok().map(|value| (key.to_string(), value))
            })
            .collect()
    }

    /// Stores every item with the same TTL, stopping at the first failure.
    pub fn set_multi<I>(&self, items: I, ttl: Duration) -> Result<()>
    where
        I: IntoIterator<Item = (String, V)>,
    {
        for (key, value) in items {
            self.set(key, value, ttl)?;
        }
        Ok(())
    }

    // == Purge Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let expired_keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            inner.remove_entry(key);
        }

        self.stats.set_occupancy(inner.entries.len(), inner.size_bytes);
        self.stats.record_expirations(expired_keys.len());
        expired_keys.len()
    }

    // == Stats ==
    /// Returns current statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<String> {
        self.inner.lock().lru.keys_by_recency()
    }

    /// Hands evicted entries to the callback. Must run without the store lock held.
    fn notify_evicted(&self, evicted: Vec<CacheEntry<V>>) {
        if evicted.is_empty() {
            return;
        }
        self.stats.record_evictions(evicted.len());
        debug!(count = evicted.len(), "Evicted entries from tier 1");

        let callback = self.on_evict.read().clone();
        if let Some(callback) = callback {
            let now = Instant::now();
            for entry in evicted.iter().filter(|e| !e.is_expired_at(now)) {
                callback(&entry.key, &entry.value);
            }
        }
    }
}
