//! Cache-fronted, coalescing resolver
//!
//! A resolution for a key that is already being resolved does not start a
//! second one: it awaits the first. Each resolution runs in its own task,
//! so a caller that gives up does not cancel it; the task writes the cache
//! before it leaves the in-flight map.

use crate::cache::Cache;
use crate::error::ResolveError;
use crate::router::{FailoverRouter, ResolvedUrl};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tfsource::TrackKey;
use tracing::debug;

pub type ResolveResult = Result<ResolvedUrl, ResolveError>;

type InFlight = Shared<BoxFuture<'static, ResolveResult>>;

/// Leaves the in-flight map when the resolution task ends, even by panic
struct InFlightGuard {
    in_flight: Arc<Mutex<HashMap<TrackKey, InFlight>>>,
    key: TrackKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
    }
}

pub struct Resolver {
    router: Arc<FailoverRouter>,
    cache: Arc<Cache<TrackKey, ResolvedUrl>>,
    in_flight: Arc<Mutex<HashMap<TrackKey, InFlight>>>,
}

impl Resolver {
    pub fn new(router: Arc<FailoverRouter>, cache: Arc<Cache<TrackKey, ResolvedUrl>>) -> Self {
        Self {
            router,
            cache,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn cache(&self) -> &Arc<Cache<TrackKey, ResolvedUrl>> {
        &self.cache
    }

    pub fn router(&self) -> &Arc<FailoverRouter> {
        &self.router
    }

    /// Fresh cache entry present; does not count as a cache lookup
    pub fn is_cached(&self, key: &TrackKey) -> bool {
        self.cache.contains(key)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub async fn resolve(&self, key: &TrackKey) -> ResolveResult {
        let pending = {
            let mut in_flight = self.in_flight.lock();

            if let Some(pending) = in_flight.get(key) {
                debug!(track = %key, "joining in-flight resolution");
                pending.clone()
            } else if let Some(hit) = self.cache.get(key) {
                debug!(track = %key, provider = %hit.provider, "cache hit");
                return Ok(hit);
            } else {
                debug!(track = %key, "cache miss");
                let pending = self.spawn_resolution(key.clone());
                in_flight.insert(key.clone(), pending.clone());
                pending
            }
        };

        pending.await
    }

    fn spawn_resolution(&self, key: TrackKey) -> InFlight {
        let router = self.router.clone();
        let cache = self.cache.clone();
        let in_flight = self.in_flight.clone();

        // removal waits for the caller's insert: the map lock is held here
        let handle = tokio::spawn(async move {
            let guard = InFlightGuard {
                in_flight,
                key: key.clone(),
            };
            let result = router.resolve(&key).await;
            if let Ok(resolved) = &result {
                cache.put(key, resolved.clone());
            }
            drop(guard);
            result
        });

        async move { handle.await.unwrap_or(Err(ResolveError::Interrupted)) }
            .boxed()
            .shared()
    }
}
