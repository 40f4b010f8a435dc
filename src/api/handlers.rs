//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use tracing::debug;

use crate::cache::{json_size_estimator, BoundedStore};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::facade::CacheManager;
use crate::keys::cache_key;
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse, StatsResponse,
    WarmupResponse,
};
use crate::tiered::TieredCache;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<CacheManager<Value>>,
    /// TTL for writes that do not carry one
    pub default_ttl: Duration,
}

impl AppState {
    pub fn new(manager: Arc<CacheManager<Value>>, default_ttl: Duration) -> Self {
        Self {
            manager,
            default_ttl,
        }
    }

    /// Builds a tier-1-only cache sized from the configuration.
    pub fn from_config(config: &Config) -> Self {
        let store = BoundedStore::new(config.store_limits(), json_size_estimator());
        let cache = Arc::new(TieredCache::new(store, None, None));
        let manager = Arc::new(CacheManager::new(cache, config));
        Self::new(manager, config.default_ttl())
    }
}

/// Handler for PUT /set
///
/// Stores a JSON value, optionally namespaced, with an optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = req.ttl.map(Duration::from_secs).unwrap_or(state.default_ttl);
    state
        .manager
        .set(&req.namespace, &req.key, req.value, ttl)
        .await?;

    Ok(Json(SetResponse::new(
        cache_key(&req.namespace, &req.key),
        ttl.as_secs(),
    )))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    lookup(&state, "", &key).await
}

/// Handler for GET /get/:namespace/:key
pub async fn get_namespaced_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<Json<GetResponse>> {
    lookup(&state, &namespace, &key).await
}

async fn lookup(state: &AppState, namespace: &str, key: &str) -> Result<Json<GetResponse>> {
    let value = state.manager.get(namespace, key).await?;
    Ok(Json(GetResponse::new(cache_key(namespace, key), value)))
}

/// Handler for DELETE /del/:key
///
/// Succeeds whether or not the key was present.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.manager.delete("", &key).await?;
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for DELETE /del/:namespace/:key
pub async fn delete_namespaced_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    state.manager.delete(&namespace, &key).await?;
    Ok(Json(DeleteResponse::new(cache_key(&namespace, &key))))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(state.manager.stats()))
}

/// Handler for POST /warmup
///
/// Runs every registered strategy now. Any failing strategy turns the
/// response into an error; the others' data stays cached.
pub async fn warmup_handler(State(state): State<AppState>) -> Result<Json<WarmupResponse>> {
    let report = state.manager.warmer().warmup().await?;
    debug!(entries = report.entries_loaded, "Warmup requested over HTTP");
    Ok(Json(WarmupResponse::new(report)))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
