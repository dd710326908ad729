//! Request and response model shared by the caching layer.
//!
//! A [`Request`] is the normalized identity of an outgoing fetch; a
//! [`ResponseSnapshot`] is the immutable capture of a response that the
//! cache stores and serves. The [`Fetcher`] trait is the seam between the
//! strategy engine and the real network so strategies can be exercised with
//! stub transports.

use crate::error::{Result, SashiError};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// Header stamped on responses the engine served from cache instead of the
/// network, so the UI can tell stale data from fresh data.
pub const SERVED_FROM_CACHE_HEADER: &str = "x-sashi-served-from";
pub const SERVED_FROM_CACHE_VALUE: &str = "cache";

/// HTTP method. Only GET responses are cacheable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
        }
    }
}

/// Whether a request is a top-level navigation (document) or a subresource
/// fetch. Navigations fall back to the application shell when offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Navigate,
    Resource,
}

/// An outgoing request as seen by the caching layer.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub mode: FetchMode,
}

impl Request {
    /// A GET subresource request.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            mode: FetchMode::Resource,
        }
    }

    /// A top-level navigation request.
    pub fn navigate(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            mode: FetchMode::Navigate,
        }
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == FetchMode::Navigate
    }

    /// URL path component.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// ASCII-serialized origin, e.g. `https://cdn.jsdelivr.net`.
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    /// Normalized cache identity: method plus the absolute URL with the
    /// fragment stripped.
    pub fn identity(&self) -> RequestIdentity {
        let mut url = self.url.clone();
        url.set_fragment(None);
        RequestIdentity {
            method: self.method.as_str().to_string(),
            url: url.to_string(),
        }
    }
}

/// Cache key: normalized absolute URL plus method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestIdentity {
    pub method: String,
    pub url: String,
}

/// Immutable capture of a response.
///
/// The body is a [`Bytes`] handle, so cloning a snapshot for a cache read
/// never copies the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ResponseSnapshot {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A 200 snapshot with a content type and body.
    pub fn ok(content_type: &str, body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            headers: vec![("content-type".to_string(), content_type.to_string())],
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value matching `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Copy of this snapshot with an extra header appended.
    pub fn with_header(&self, name: &str, value: &str) -> Self {
        let mut headers = self.headers.clone();
        headers.push((name.to_string(), value.to_string()));
        Self {
            status: self.status,
            headers,
            body: self.body.clone(),
        }
    }

    /// Whether this snapshot was stamped as served from cache.
    pub fn served_from_cache(&self) -> bool {
        self.header(SERVED_FROM_CACHE_HEADER) == Some(SERVED_FROM_CACHE_VALUE)
    }
}

/// Seam between the caching layer and the network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request and capture the response. Transport-level
    /// failures (DNS, refused connection) surface as errors; HTTP error
    /// statuses surface as snapshots.
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot>;
}

/// Production [`Fetcher`] backed by reqwest.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("sashi-client")
            .build()
            .map_err(|e| SashiError::Transport {
                message: format!("Failed to build HTTP client: {}", e),
                cause: None,
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot> {
        let builder = match request.method {
            Method::Get => self.client.get(request.url.clone()),
            Method::Head => self.client.head(request.url.clone()),
            Method::Post => self.client.post(request.url.clone()),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;

        Ok(ResponseSnapshot::new(status, headers, body))
    }
}
