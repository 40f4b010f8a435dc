//! Cache Module
//!
//! Tier-1 in-memory caching with TTL expiration, LRU eviction and
//! item/size limits.

mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use stats::{hit_rate, CacheStats, StatsCounters};
pub use store::{
    json_size_estimator, BoundedStore, EvictionCallback, SizeEstimator, StoreLimits,
};

// == Public Constants ==
/// Size assumed for a value whose size cannot be estimated
pub const DEFAULT_ENTRY_SIZE: usize = 1024;

/// TTL meaning "never expires"
pub const NO_EXPIRY: std::time::Duration = std::time::Duration::ZERO;
