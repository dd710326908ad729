//! Cache strategy engine.
//!
//! Executes one of three strategies per request class: cache-first for
//! static assets, network-first with stale fallback for API reads, and
//! stale-while-revalidate for everything dynamic. Bypass traffic goes
//! straight to the network and never touches the store.
//!
//! Cache failures are absorbed here: a broken store behaves like an empty
//! one and the request falls through to network or the offline fallback.

use crate::classify::{classify, Classification};
use crate::config::StrategyConfig;
use crate::fallback::OfflineFallbackGenerator;
use crate::http::{
    Fetcher, Request, ResponseSnapshot, SERVED_FROM_CACHE_HEADER, SERVED_FROM_CACHE_VALUE,
};
use crate::store::{ActiveNamespaces, CacheNamespace, CacheStore};
use crate::Result;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};
use url::Url;

/// Routes every network-bound request through the strategy matching its
/// classification.
pub struct CacheStrategyEngine {
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    active: Arc<RwLock<ActiveNamespaces>>,
    fallback: OfflineFallbackGenerator,
}

impl CacheStrategyEngine {
    pub fn new(
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetcher>,
        active: Arc<RwLock<ActiveNamespaces>>,
        base: Url,
    ) -> Self {
        let fallback = OfflineFallbackGenerator::new(store.clone(), active.clone(), base);
        Self {
            store,
            fetcher,
            active,
            fallback,
        }
    }

    /// Handle one request. STATIC/API/DYNAMIC traffic always resolves to a
    /// response (degraded at worst); only BYPASS propagates network errors.
    pub async fn handle(&self, request: &Request) -> Result<ResponseSnapshot> {
        match classify(request) {
            Classification::Bypass => self.fetcher.fetch(request).await,
            Classification::Static => Ok(self.cache_first(request).await),
            Classification::Api => Ok(self.network_first(request).await),
            Classification::Dynamic => Ok(self.stale_while_revalidate(request).await),
        }
    }

    /// Cache-first: serve a hit immediately; on miss fetch and write
    /// through; on network failure fall back (navigations get the shell).
    async fn cache_first(&self, request: &Request) -> ResponseSnapshot {
        let ns = self.static_ns();
        if let Some(snapshot) = self.read_cache(&ns, request) {
            return snapshot;
        }

        match self.fetcher.fetch(request).await {
            Ok(snapshot) => {
                self.write_through(&ns, request, &snapshot);
                snapshot
            }
            Err(e) => {
                warn!("Cache-first fetch failed for {}: {}", request.url, e);
                self.fallback.fallback(request)
            }
        }
    }

    /// Network-first: try the network under a bounded wait; on failure
    /// serve the stale entry (marked) or a degraded response.
    async fn network_first(&self, request: &Request) -> ResponseSnapshot {
        let ns = self.dynamic_ns();
        let attempt = tokio::time::timeout(
            StrategyConfig::NETWORK_FIRST_TIMEOUT,
            self.fetcher.fetch(request),
        )
        .await;

        match attempt {
            Ok(Ok(snapshot)) => {
                self.write_through(&ns, request, &snapshot);
                snapshot
            }
            Ok(Err(e)) => {
                debug!("Network-first fetch failed for {}: {}", request.url, e);
                self.stale_or_fallback(&ns, request)
            }
            Err(_) => {
                debug!("Network-first fetch timed out for {}", request.url);
                self.stale_or_fallback(&ns, request)
            }
        }
    }

    /// Stale-while-revalidate: serve a hit immediately and refresh the
    /// entry in the background; on miss await the network directly.
    async fn stale_while_revalidate(&self, request: &Request) -> ResponseSnapshot {
        let ns = self.dynamic_ns();
        if let Some(snapshot) = self.read_cache(&ns, request) {
            self.spawn_revalidation(ns, request.clone());
            return snapshot;
        }

        match self.fetcher.fetch(request).await {
            Ok(snapshot) => {
                self.write_through(&ns, request, &snapshot);
                snapshot
            }
            Err(e) => {
                warn!("Dynamic fetch failed for {}: {}", request.url, e);
                self.fallback.fallback(request)
            }
        }
    }

    /// Fire-and-forget refresh of a cache entry. The original caller never
    /// waits on this; its outcome only affects future requests.
    fn spawn_revalidation(&self, ns: CacheNamespace, request: Request) {
        let store = self.store.clone();
        let fetcher = self.fetcher.clone();
        tokio::spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(snapshot) if snapshot.is_success() => {
                    if let Err(e) = store.put(&ns, &request.identity(), &snapshot) {
                        // Lost update is harmless; the namespace may have
                        // been reclaimed mid-flight.
                        debug!("Revalidation write dropped for {}: {}", request.url, e);
                    } else {
                        debug!("Revalidated {}", request.url);
                    }
                }
                Ok(snapshot) => {
                    debug!(
                        "Revalidation for {} returned {}, keeping stale entry",
                        request.url, snapshot.status
                    );
                }
                Err(e) => {
                    debug!("Revalidation failed for {}: {}", request.url, e);
                }
            }
        });
    }

    fn stale_or_fallback(&self, ns: &CacheNamespace, request: &Request) -> ResponseSnapshot {
        if let Some(snapshot) = self.read_cache(ns, request) {
            debug!("Serving stale cache entry for {}", request.url);
            return snapshot.with_header(SERVED_FROM_CACHE_HEADER, SERVED_FROM_CACHE_VALUE);
        }
        self.fallback.fallback(request)
    }

    /// Cache read with failures downgraded to a miss.
    fn read_cache(&self, ns: &CacheNamespace, request: &Request) -> Option<ResponseSnapshot> {
        match self.store.get(ns, &request.identity()) {
            Ok(Some(entry)) => Some(entry.snapshot),
            Ok(None) => None,
            Err(e) => {
                warn!("Cache read failed for {}, treating as miss: {}", request.url, e);
                None
            }
        }
    }

    /// Write a fresh response into cache before returning it. Only 2xx
    /// snapshots are persisted; write failures are harmless lost updates.
    fn write_through(&self, ns: &CacheNamespace, request: &Request, snapshot: &ResponseSnapshot) {
        if !snapshot.is_success() {
            return;
        }
        if let Err(e) = self.store.put(ns, &request.identity(), snapshot) {
            warn!("Write-through dropped for {}: {}", request.url, e);
        }
    }

    fn static_ns(&self) -> CacheNamespace {
        self.active.read().unwrap().static_ns
    }

    fn dynamic_ns(&self) -> CacheNamespace {
        self.active.read().unwrap().dynamic_ns
    }
}
