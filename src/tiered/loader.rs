//! Loader Module
//!
//! Tier 3: the system of record consulted when every cache tier misses.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::{CacheError, Result};

/// Produces the authoritative value for a key.
///
/// `NotFound` is the clean "does not exist" outcome; any other error is
/// treated as a tier failure. Either way the orchestrator reports a miss.
#[async_trait]
pub trait Loader<V>: Send + Sync {
    async fn load(&self, key: &str) -> Result<V>;
}

type LoadFn<V> = dyn Fn(String) -> BoxFuture<'static, anyhow::Result<Option<V>>> + Send + Sync;

/// Adapts an async closure into a [`Loader`].
pub struct FnLoader<V> {
    load: Arc<LoadFn<V>>,
}

#[async_trait]
impl<V: Send + 'static> Loader<V> for FnLoader<V> {
    async fn load(&self, key: &str) -> Result<V> {
        match (self.load)(key.to_string()).await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(CacheError::NotFound(key.to_string())),
            Err(err) => Err(CacheError::TierUnavailable(format!("loader: {:#}", err))),
        }
    }
}

/// Wraps a closure returning `Ok(Some(v))` on success and `Ok(None)` when the
/// key does not exist in the source.
///
/// ```ignore
/// let loader = loader_fn(|key| async move { db.fetch(&key).await });
/// ```
pub fn loader_fn<V, F, Fut>(f: F) -> Arc<dyn Loader<V>>
where
    V: Send + 'static,
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Option<V>>> + Send + 'static,
{
    Arc::new(FnLoader {
        load: Arc::new(move |key| f(key).boxed()),
    })
}
