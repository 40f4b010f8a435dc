//! API Module
//!
//! HTTP handlers and routing for the cache server REST API.
//!
//! # Endpoints
//! - `PUT /set` - Store a JSON value, optionally namespaced
//! - `GET /get/:key`, `GET /get/:namespace/:key` - Tiered read
//! - `DELETE /del/:key`, `DELETE /del/:namespace/:key` - Delete from every tier
//! - `GET /stats` - Tiered, warmer and invalidation statistics
//! - `POST /warmup` - Run all warmup strategies now
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
