//! Centralized configuration for the Sashi client layer.
//!
//! Route tables and timing constants live here so the classifier, the
//! strategy engine, and the prediction client all agree on which paths are
//! cacheable and how long a call may run.

use std::time::Duration;

/// Request routing tables.
///
/// The bypass list is exactly the prediction and health endpoints: their
/// responses are volatile and must never be read from or written to cache.
pub struct Routes;

impl Routes {
    /// Prediction endpoint (multipart POST).
    pub const PREDICT_PATH: &'static str = "/api/predict";
    /// Health endpoint.
    pub const HEALTH_PATH: &'static str = "/api/health";
    /// Paths excluded from every caching strategy.
    pub const BYPASS_PATHS: [&'static str; 2] = [Self::PREDICT_PATH, Self::HEALTH_PATH];

    /// Root under which all API reads live.
    pub const API_ROOT: &'static str = "/api/";
    /// Root for same-origin static assets.
    pub const STATIC_ROOT: &'static str = "/static/";
    /// Application shell route.
    pub const SHELL_PATH: &'static str = "/";
    /// PWA manifest, served with the shell.
    pub const MANIFEST_PATH: &'static str = "/manifest.json";

    /// Third-party origins whose stylesheets/scripts the shell depends on.
    pub const ALLOWED_ORIGINS: [&'static str; 2] = [
        "https://cdn.jsdelivr.net",
        "https://fonts.googleapis.com",
    ];
}

/// Static assets pre-warmed into the STATIC namespace at install time.
pub struct StaticManifest;

impl StaticManifest {
    pub const ASSETS: [&'static str; 6] = [
        Routes::SHELL_PATH,
        Routes::MANIFEST_PATH,
        "/static/css/style.css",
        "/static/js/app.js",
        "/static/icons/icon-192.png",
        "/static/icons/icon-512.png",
    ];
}

/// Timing and size bounds for the prediction client.
pub struct ClientConfig;

impl ClientConfig {
    /// Per-attempt bound on the prediction call.
    pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);
    /// Fixed delay between attempts.
    pub const RETRY_DELAY: Duration = Duration::from_secs(1);
    /// Retries after the first attempt (4 attempts total).
    pub const MAX_RETRIES: u32 = 3;
    /// Server rejects larger uploads with 413; enforced client-side too.
    pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;
    /// Timeout for the lightweight health probe.
    pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
    /// Default service base URL.
    pub const DEFAULT_BASE_URL: &'static str = "http://127.0.0.1:5000";
}

/// Timing bounds for the caching strategies.
pub struct StrategyConfig;

impl StrategyConfig {
    /// Bounded wait on the network leg of network-first before falling back
    /// to a stale cache entry.
    pub const NETWORK_FIRST_TIMEOUT: Duration = Duration::from_secs(5);
    /// Timeout for install-time asset pre-fetches.
    pub const INSTALL_FETCH_TIMEOUT: Duration = Duration::from_secs(15);
}
