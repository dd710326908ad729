//! Sashi Core - offline-resilient caching and request routing.
//!
//! This crate is the client-side resilience layer of the Sashi grading app:
//! every outgoing request is classified, routed through one of three cache
//! strategies against a generation-versioned store, and degraded gracefully
//! when neither cache nor network can answer. The prediction call itself
//! lives in the `sashi-client` crate.
//!
//! # Example
//!
//! ```rust,ignore
//! use sashi_core::{CacheStrategyEngine, HttpFetcher, LifecycleController, SqliteStore};
//! use std::sync::Arc;
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> sashi_core::Result<()> {
//!     let store = Arc::new(SqliteStore::open("sashi-cache.db")?);
//!     let base = Url::parse("http://127.0.0.1:5000").unwrap();
//!
//!     let controller = LifecycleController::with_http(store.clone(), base.clone(), 1)?
//!         .with_auto_activate(true);
//!     controller.install().await?;
//!
//!     let fetcher = Arc::new(HttpFetcher::new(std::time::Duration::from_secs(15))?);
//!     let engine = CacheStrategyEngine::new(
//!         store,
//!         fetcher,
//!         controller.active_namespaces(),
//!         base,
//!     );
//!     // engine.handle(&request).await ...
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod fallback;
pub mod http;
pub mod lifecycle;
pub mod store;
pub mod strategy;

// Re-export commonly used types
pub use classify::{classify, Classification};
pub use error::{Result, SashiError};
pub use fallback::OfflineFallbackGenerator;
pub use http::{
    Fetcher, FetchMode, HttpFetcher, Method, Request, RequestIdentity, ResponseSnapshot,
    SERVED_FROM_CACHE_HEADER, SERVED_FROM_CACHE_VALUE,
};
pub use lifecycle::{
    ControlMessage, ControlReply, LifecycleController, LifecycleEvent, LifecyclePhase,
};
pub use store::{
    ActiveNamespaces, CacheEntry, CacheNamespace, CacheStore, MemoryStore, NamespaceRole,
    SqliteStore,
};
pub use strategy::CacheStrategyEngine;
