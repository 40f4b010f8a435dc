//! Error types for the tiered cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the tiered cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is absent from every tier consulted
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Key was present in the store but its deadline has passed
    #[error("Key expired: {0}")]
    Expired(String),

    /// A remote tier or loader failed for a reason other than "not found"
    #[error("Tier unavailable: {0}")]
    TierUnavailable(String),

    /// Entry can never fit within the configured size limit
    #[error("Entry for key {key} is {size} bytes, exceeding the {limit} byte limit")]
    EntryTooLarge {
        key: String,
        size: usize,
        limit: usize,
    },

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// One or more warmup strategies failed
    #[error("Warmup completed with {failed} of {total} strategies failing: {details}")]
    WarmupFailed {
        failed: usize,
        total: usize,
        details: String,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// True for the outcomes that mean "nothing usable under this key".
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::NotFound(_) | CacheError::Expired(_))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) | CacheError::Expired(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::EntryTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CacheError::TierUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::WarmupFailed { .. } | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the tiered cache.
pub type Result<T> = std::result::Result<T, CacheError>;
