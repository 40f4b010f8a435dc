//! Cache keys, namespaces and TTL policy shared by the warmer and the facade.

use std::time::Duration;

/// Builds `"<namespace>:<key>"`, or the bare key when the namespace is empty.
pub fn cache_key(namespace: &str, key: &str) -> String {
    if namespace.is_empty() {
        key.to_string()
    } else {
        format!("{}:{}", namespace, key)
    }
}

// == TTL Policy ==
// Hot data: frequently read, rarely changes
pub const TTL_SYMBOL_CONFIG: Duration = Duration::from_secs(60 * 60);
pub const TTL_USER_ACCOUNT: Duration = Duration::from_secs(5 * 60);

// Live data
pub const TTL_MARKET_PRICE: Duration = Duration::from_secs(1);

// Historical data
pub const TTL_OHLC_HISTORICAL: Duration = Duration::from_secs(24 * 60 * 60);

// == Namespaces ==
pub const NS_SYMBOLS: &str = "symbols";
pub const NS_ACCOUNTS: &str = "accounts";
pub const NS_POSITIONS: &str = "positions";
pub const NS_PRICES: &str = "prices";
pub const NS_OHLC: &str = "ohlc";
