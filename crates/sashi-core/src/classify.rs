//! Request classification.
//!
//! Pure routing decision for every outgoing request. The result picks the
//! caching strategy; BYPASS traffic never touches the cache at all.

use crate::config::Routes;
use crate::http::{Method, Request};

/// How a request is routed through the caching layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Cache-first: application shell and assets.
    Static,
    /// Network-first with stale-cache fallback: cacheable API reads.
    Api,
    /// Stale-while-revalidate: everything else.
    Dynamic,
    /// Straight to network, no cache read or write ever.
    Bypass,
}

/// Classify a request. Pure, no side effects.
///
/// Rules in order: the bypass list wins over everything; then static assets
/// (static root, shell route, manifest, allow-listed third-party origins);
/// then the API root; then dynamic. Non-GET requests are never cacheable
/// and always bypass.
pub fn classify(request: &Request) -> Classification {
    if request.method != Method::Get {
        return Classification::Bypass;
    }

    let path = request.path();

    if Routes::BYPASS_PATHS.contains(&path) {
        return Classification::Bypass;
    }

    let origin = request.origin();
    if Routes::ALLOWED_ORIGINS.iter().any(|o| *o == origin) {
        return Classification::Static;
    }
    if path == Routes::SHELL_PATH
        || path == Routes::MANIFEST_PATH
        || path.starts_with(Routes::STATIC_ROOT)
    {
        return Classification::Static;
    }

    if path.starts_with(Routes::API_ROOT) {
        return Classification::Api;
    }

    Classification::Dynamic
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::FetchMode;
    use url::Url;

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[test]
    fn test_prediction_and_health_bypass() {
        assert_eq!(
            classify(&get("http://127.0.0.1:5000/api/predict")),
            Classification::Bypass
        );
        assert_eq!(
            classify(&get("http://127.0.0.1:5000/api/health")),
            Classification::Bypass
        );
    }

    #[test]
    fn test_shell_and_assets_are_static() {
        assert_eq!(classify(&get("http://127.0.0.1:5000/")), Classification::Static);
        assert_eq!(
            classify(&get("http://127.0.0.1:5000/manifest.json")),
            Classification::Static
        );
        assert_eq!(
            classify(&get("http://127.0.0.1:5000/static/js/app.js")),
            Classification::Static
        );
        assert_eq!(
            classify(&get("http://127.0.0.1:5000/static/icons/icon-192.png")),
            Classification::Static
        );
    }

    #[test]
    fn test_allow_listed_origins_are_static() {
        assert_eq!(
            classify(&get("https://cdn.jsdelivr.net/npm/chart.js/dist/chart.min.js")),
            Classification::Static
        );
        assert_eq!(
            classify(&get("https://fonts.googleapis.com/css2?family=Inter")),
            Classification::Static
        );
    }

    #[test]
    fn test_other_api_reads_are_api() {
        assert_eq!(
            classify(&get("http://127.0.0.1:5000/api/model/info")),
            Classification::Api
        );
    }

    #[test]
    fn test_everything_else_is_dynamic() {
        assert_eq!(
            classify(&get("http://127.0.0.1:5000/history")),
            Classification::Dynamic
        );
        assert_eq!(
            classify(&get("https://example.org/some/page")),
            Classification::Dynamic
        );
    }

    #[test]
    fn test_non_get_always_bypasses() {
        let mut req = get("http://127.0.0.1:5000/static/js/app.js");
        req.method = Method::Post;
        assert_eq!(classify(&req), Classification::Bypass);
    }

    #[test]
    fn test_navigation_mode_does_not_change_class() {
        let req = Request {
            mode: FetchMode::Navigate,
            ..get("http://127.0.0.1:5000/")
        };
        assert_eq!(classify(&req), Classification::Static);
    }
}
