//! Tiered Cache - a multi-tier read-through cache
//!
//! Tier 1 is a bounded in-process store with TTL expiry and LRU eviction,
//! tier 2 a pluggable remote cache, tier 3 a loader for the system of
//! record. A warmer pre-populates the cache and a namespace-aware manager
//! ties it together; an HTTP API exposes it.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod facade;
pub mod keys;
pub mod models;
pub mod tasks;
pub mod tiered;
pub mod warmer;

pub use api::AppState;
pub use cache::{BoundedStore, StoreLimits};
pub use config::Config;
pub use error::{CacheError, Result};
pub use facade::CacheManager;
pub use tasks::spawn_sweeper;
pub use tiered::{loader_fn, InMemoryRemote, Loader, RemoteTier, TieredCache};
pub use warmer::{CacheWarmer, NamespaceWarmup, RefreshPolicy, WarmupStrategy};
