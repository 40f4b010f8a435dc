//! Configuration Module
//!
//! Handles loading and managing cache and server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::StoreLimits;

/// Cache server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries tier 1 can hold (0 = unlimited)
    pub max_items: usize,
    /// Maximum estimated size of tier 1 in bytes (0 = unlimited)
    pub max_size_bytes: usize,
    /// Default TTL in seconds for API writes without explicit TTL
    pub default_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Expiry sweep interval in seconds
    pub sweep_interval: u64,
    /// Warmer refresh interval in seconds
    pub refresh_interval: u64,
    /// Performance monitor interval in seconds
    pub monitor_interval: u64,
    /// Propagate writes to tier 2
    pub write_through: bool,
    /// Demote tier-1 evictions to tier 2
    pub write_back: bool,
    /// Run warmup and periodic refresh
    pub warmup_enabled: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `L1_MAX_ITEMS` - Tier-1 item limit (default: 10000)
    /// - `L1_MAX_SIZE_BYTES` - Tier-1 size limit (default: 100 MB)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Expiry sweep frequency in seconds (default: 10)
    /// - `REFRESH_INTERVAL` - Warmer refresh frequency in seconds (default: 3600)
    /// - `MONITOR_INTERVAL` - Monitor frequency in seconds (default: 60)
    /// - `WRITE_THROUGH` - Propagate writes to tier 2 (default: true)
    /// - `WRITE_BACK` - Demote evictions to tier 2 (default: false)
    /// - `WARMUP_ENABLED` - Enable cache warming (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_items: env_or("L1_MAX_ITEMS", defaults.max_items),
            max_size_bytes: env_or("L1_MAX_SIZE_BYTES", defaults.max_size_bytes),
            default_ttl: env_or("DEFAULT_TTL", defaults.default_ttl),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            sweep_interval: env_or("SWEEP_INTERVAL", defaults.sweep_interval),
            refresh_interval: env_or("REFRESH_INTERVAL", defaults.refresh_interval),
            monitor_interval: env_or("MONITOR_INTERVAL", defaults.monitor_interval),
            write_through: env_or("WRITE_THROUGH", defaults.write_through),
            write_back: env_or("WRITE_BACK", defaults.write_back),
            warmup_enabled: env_or("WARMUP_ENABLED", defaults.warmup_enabled),
        }
    }

    /// Tier-1 capacity limits.
    pub fn store_limits(&self) -> StoreLimits {
        StoreLimits::new(self.max_items, self.max_size_bytes)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.max(1))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval.max(1))
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_items: 10_000,
            max_size_bytes: 100 * 1024 * 1024,
            default_ttl: 300,
            server_port: 3000,
            sweep_interval: 10,
            refresh_interval: 3600,
            monitor_interval: 60,
            write_through: true,
            write_back: false,
            warmup_enabled: true,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
