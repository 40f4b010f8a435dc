//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

const MAX_KEY_LEN: usize = 256;
const MAX_NAMESPACE_LEN: usize = 64;

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `namespace`: Optional namespace, the key is stored as `namespace:key`
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds; omitted uses the default, 0 never expires
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    #[serde(default)]
    pub namespace: String,
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LEN {
            return Some(format!(
                "Key exceeds maximum length of {} characters",
                MAX_KEY_LEN
            ));
        }
        if self.namespace.len() > MAX_NAMESPACE_LEN {
            return Some(format!(
                "Namespace exceeds maximum length of {} characters",
                MAX_NAMESPACE_LEN
            ));
        }
        None
    }
}
