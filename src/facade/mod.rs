//! Facade Module
//!
//! Namespace-aware cache API with domain TTL policy, invalidation
//! bookkeeping and performance monitoring.

mod manager;
mod monitor;

pub use manager::{CacheManager, InvalidationHook, ManagerStats};
pub use monitor::{evaluate, spawn_monitor, HealthWarning, Thresholds};
