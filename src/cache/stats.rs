//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Computes `hits / (hits + misses)`, or 0.0 if no lookups have been made.
pub fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

// == Stats Counters ==
/// Live counters for one store instance.
///
/// Atomics so that snapshots never wait on the store lock.
#[derive(Debug, Default)]
pub struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    items: AtomicU64,
    size_bytes: AtomicU64,
    get_nanos: AtomicU64,
    get_calls: AtomicU64,
    set_nanos: AtomicU64,
    set_calls: AtomicU64,
}

impl StatsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_expirations(&self, count: usize) {
        self.expirations.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Latency of one get call.
    pub fn record_get_latency(&self, elapsed: Duration) {
        self.get_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        self.get_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Latency of one set call.
    pub fn record_set_latency(&self, elapsed: Duration) {
        self.set_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        self.set_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Mirrors the store's occupancy. Called with the store lock held.
    pub fn set_occupancy(&self, items: usize, size_bytes: usize) {
        self.items.store(items as u64, Ordering::Relaxed);
        self.size_bytes.store(size_bytes as u64, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Returns a point-in-time copy of every counter.
    pub fn snapshot(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);

        CacheStats {
            hits,
            misses,
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            items: self.items.load(Ordering::Relaxed) as usize,
            size_bytes: self.size_bytes.load(Ordering::Relaxed) as usize,
            hit_rate: hit_rate(hits, misses),
            avg_get_latency_ns: average(&self.get_nanos, &self.get_calls),
            avg_set_latency_ns: average(&self.set_nanos, &self.set_calls),
        }
    }
}

fn average(total: &AtomicU64, calls: &AtomicU64) -> u64 {
    let calls = calls.load(Ordering::Relaxed);
    if calls == 0 {
        0
    } else {
        total.load(Ordering::Relaxed) / calls
    }
}

// == Cache Stats ==
/// Snapshot of a store's performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of successful retrievals
    pub hits: u64,
    /// Number of failed retrievals (key not found or expired)
    pub misses: u64,
    /// Number of writes
    pub sets: u64,
    /// Number of explicit deletes that removed an entry
    pub deletes: u64,
    /// Number of entries evicted due to capacity limits
    pub evictions: u64,
    /// Number of entries removed because their deadline passed
    pub expirations: u64,
    /// Current number of entries
    pub items: usize,
    /// Current estimated size in bytes
    pub size_bytes: usize,
    /// hits / (hits + misses)
    pub hit_rate: f64,
    /// Average get latency in nanoseconds
    pub avg_get_latency_ns: u64,
    /// Average set latency in nanoseconds
    pub avg_set_latency_ns: u64,
}

impl CacheStats {
    pub fn avg_get_latency(&self) -> Duration {
        Duration::from_nanos(self.avg_get_latency_ns)
    }

    pub fn avg_set_latency(&self) -> Duration {
        Duration::from_nanos(self.avg_set_latency_ns)
    }
}
