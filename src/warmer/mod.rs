//! Warmer Module
//!
//! Pre-populates the tiered cache from pluggable strategies and keeps the
//! periodic ones fresh in the background.

mod cache_warmer;
mod strategy;

pub use cache_warmer::{CacheWarmer, StrategyFailure, WarmerStats, WarmupReport};
pub use strategy::{NamespaceWarmup, RefreshPolicy, WarmupStrategy};
