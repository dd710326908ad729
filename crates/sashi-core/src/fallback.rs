//! Degraded responses for requests neither cache nor network can satisfy.

use crate::config::Routes;
use crate::http::{Request, ResponseSnapshot};
use crate::store::{ActiveNamespaces, CacheStore};
use std::sync::{Arc, RwLock};
use tracing::debug;
use url::Url;

/// Minimal self-contained offline page, served when even the cached shell
/// is gone.
const OFFLINE_PAGE: &str = r#"<!doctype html>
<html lang="ja">
<head><meta charset="utf-8"><title>Sashi - offline</title></head>
<body>
<h1>オフラインです</h1>
<p>ネットワーク接続がありません。接続が戻り次第、再度お試しください。</p>
</body>
</html>"#;

/// Machine-readable degraded payload for API requests, letting the UI tell
/// "offline" apart from "server error".
const OFFLINE_API_BODY: &str =
    r#"{"status":"error","message":"Service unavailable while offline","offline":true}"#;

/// Synthesizes a well-formed response when everything else has failed.
///
/// This generator never fails: cache errors during the shell lookup are
/// treated as a miss and the built-in page is used instead.
pub struct OfflineFallbackGenerator {
    store: Arc<dyn CacheStore>,
    active: Arc<RwLock<ActiveNamespaces>>,
    base: Url,
}

impl OfflineFallbackGenerator {
    pub fn new(
        store: Arc<dyn CacheStore>,
        active: Arc<RwLock<ActiveNamespaces>>,
        base: Url,
    ) -> Self {
        Self {
            store,
            active,
            base,
        }
    }

    /// Produce a degraded response for a request that cannot be satisfied.
    pub fn fallback(&self, request: &Request) -> ResponseSnapshot {
        if request.is_navigation() {
            return self.shell_or_offline_page();
        }
        if request.path().starts_with(Routes::API_ROOT) {
            debug!("Serving degraded API payload for {}", request.url);
            return ResponseSnapshot::new(
                503,
                vec![("content-type".to_string(), "application/json".to_string())],
                OFFLINE_API_BODY.into(),
            );
        }
        ResponseSnapshot::new(
            503,
            vec![("content-type".to_string(), "text/plain".to_string())],
            "offline".into(),
        )
    }

    /// Cached application shell if available, else the built-in page.
    fn shell_or_offline_page(&self) -> ResponseSnapshot {
        if let Some(shell) = self.cached_shell() {
            debug!("Serving cached shell as offline fallback");
            return shell;
        }
        ResponseSnapshot::new(
            503,
            vec![("content-type".to_string(), "text/html".to_string())],
            OFFLINE_PAGE.into(),
        )
    }

    fn cached_shell(&self) -> Option<ResponseSnapshot> {
        let static_ns = self.active.read().ok()?.static_ns;
        let shell = Request::navigate(self.base.join(Routes::SHELL_PATH).ok()?);
        match self.store.get(&static_ns, &shell.identity()) {
            Ok(Some(entry)) => Some(entry.snapshot),
            Ok(None) => None,
            // Cache failure is a miss here, never an error
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn generator_with_store(store: Arc<dyn CacheStore>) -> OfflineFallbackGenerator {
        let active = Arc::new(RwLock::new(ActiveNamespaces::for_generation(1)));
        OfflineFallbackGenerator::new(
            store,
            active,
            Url::parse("http://127.0.0.1:5000").unwrap(),
        )
    }

    fn nav(path: &str) -> Request {
        Request::navigate(
            Url::parse("http://127.0.0.1:5000")
                .unwrap()
                .join(path)
                .unwrap(),
        )
    }

    #[test]
    fn test_api_request_gets_degraded_json() {
        let gen = generator_with_store(Arc::new(MemoryStore::new()));
        let req = Request::get(Url::parse("http://127.0.0.1:5000/api/model/info").unwrap());

        let snap = gen.fallback(&req);
        assert_eq!(snap.status, 503);

        let body: serde_json::Value = serde_json::from_slice(&snap.body).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["offline"], true);
    }

    #[test]
    fn test_api_fallback_is_idempotent() {
        let gen = generator_with_store(Arc::new(MemoryStore::new()));
        let req = Request::get(Url::parse("http://127.0.0.1:5000/api/model/info").unwrap());

        let first = gen.fallback(&req);
        let second = gen.fallback(&req);
        assert_eq!(first, second);
    }

    #[test]
    fn test_navigation_without_cached_shell_gets_offline_page() {
        let gen = generator_with_store(Arc::new(MemoryStore::new()));
        let snap = gen.fallback(&nav("/"));

        assert_eq!(snap.status, 503);
        assert_eq!(snap.header("content-type"), Some("text/html"));
        assert!(std::str::from_utf8(&snap.body).unwrap().contains("オフライン"));
    }

    #[test]
    fn test_navigation_prefers_cached_shell() {
        let store = Arc::new(MemoryStore::new());
        let gen = generator_with_store(store.clone());

        let shell = nav("/");
        let cached = ResponseSnapshot::ok("text/html", "<html>shell</html>");
        let ns = gen.active.read().unwrap().static_ns;
        store.put(&ns, &shell.identity(), &cached).unwrap();

        let snap = gen.fallback(&nav("/history"));
        assert_eq!(snap, cached);
    }

    #[test]
    fn test_other_requests_get_generic_unavailable() {
        let gen = generator_with_store(Arc::new(MemoryStore::new()));
        let req = Request::get(Url::parse("https://example.org/thing.bin").unwrap());

        let snap = gen.fallback(&req);
        assert_eq!(snap.status, 503);
        assert_eq!(&snap.body[..], b"offline");
    }
}
