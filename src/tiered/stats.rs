//! Aggregate statistics for the tiered cache.

use std::time::Duration;

use serde::Serialize;

use crate::cache::{hit_rate, CacheStats};

/// Where a lookup was finally answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierOutcome {
    L1Hit,
    L2Hit,
    L3Hit,
    Miss,
}

/// Orchestrator counters, guarded by their own lock.
#[derive(Debug, Default)]
pub(crate) struct TierCounters {
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub l3_hits: u64,
    pub misses: u64,
    pub tier2_errors: u64,
    pub loader_errors: u64,
    pub total_latency: Duration,
    pub calls: u64,
}

impl TierCounters {
    pub fn record(&mut self, outcome: TierOutcome, elapsed: Duration) {
        match outcome {
            TierOutcome::L1Hit => self.l1_hits += 1,
            TierOutcome::L2Hit => self.l2_hits += 1,
            TierOutcome::L3Hit => self.l3_hits += 1,
            TierOutcome::Miss => self.misses += 1,
        }
        self.total_latency += elapsed;
        self.calls += 1;
    }

    pub fn snapshot(&self, l1: CacheStats) -> TieredStats {
        let hits = self.l1_hits + self.l2_hits + self.l3_hits;
        let total = hits + self.misses;
        let avg_latency_ns = if self.calls == 0 {
            0
        } else {
            (self.total_latency.as_nanos() / self.calls as u128) as u64
        };

        TieredStats {
            l1_hits: self.l1_hits,
            l2_hits: self.l2_hits,
            l3_hits: self.l3_hits,
            misses: self.misses,
            total,
            hit_rate: hit_rate(hits, self.misses),
            l1_hit_rate: hit_rate(self.l1_hits, total - self.l1_hits),
            avg_latency_ns,
            tier2_errors: self.tier2_errors,
            loader_errors: self.loader_errors,
            l1_items: l1.items,
            l1_size_bytes: l1.size_bytes,
            l1_evictions: l1.evictions,
            l1,
        }
    }
}

// == Tiered Stats ==
/// Snapshot of the tiered cache's statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TieredStats {
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub l3_hits: u64,
    /// Lookups that missed every tier
    pub misses: u64,
    /// All lookups
    pub total: u64,
    /// Hits in any tier / all lookups
    pub hit_rate: f64,
    /// Tier-1 hits / all lookups
    pub l1_hit_rate: f64,
    pub avg_latency_ns: u64,
    /// Tier-2 failures other than a clean miss
    pub tier2_errors: u64,
    /// Loader failures other than a clean not-found
    pub loader_errors: u64,
    pub l1_items: usize,
    pub l1_size_bytes: usize,
    pub l1_evictions: u64,
    /// Full tier-1 store statistics
    pub l1: CacheStats,
}

impl TieredStats {
    pub fn avg_latency(&self) -> Duration {
        Duration::from_nanos(self.avg_latency_ns)
    }
}
