//! Request and response snapshots exchanged between the page, the agent,
//! the cache store and the network.

use bytes::Bytes;
use url::Url;

use crate::cache::hash::compute_cache_key;

const OFFLINE_BODY: &str = "Offline: Unable to fetch resource.";
const UNSUPPORTED_BODY: &str = "Request not supported.";

/// An outgoing request from a controlled page.
///
/// Identity for caching purposes is method + URL, fragment excluded.
/// Headers and body are carried so a bypassed request reaches the network
/// as the page issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    url: Url,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
}

impl Request {
    /// Build a request; the method is upper-cased and the fragment dropped.
    pub fn new(method: impl AsRef<str>, mut url: Url) -> Self {
        url.set_fragment(None);
        Self { method: method.as_ref().trim().to_ascii_uppercase(), url, headers: Vec::new(), body: None }
    }

    /// Shorthand for a GET request.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Key this request is stored under inside a generation.
    pub fn cache_key(&self) -> String {
        compute_cache_key(&self.method, self.url.as_str())
    }
}

/// A response snapshot, either fresh from the network or replayed from cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self { status, status_text: status_text.into(), headers: Vec::new(), body: body.into() }
    }

    /// Add a header, keeping insertion order.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Synthetic response for a resource that could not be reached and has no cached copy.
    pub fn offline() -> Self {
        Self::new(503, "Service Unavailable", OFFLINE_BODY).with_header("content-type", "text/plain")
    }

    /// Synthetic response for a bypassed request whose network fetch failed.
    pub fn unsupported() -> Self {
        Self::new(503, "Service Unavailable", UNSUPPORTED_BODY).with_header("content-type", "text/plain")
    }

    /// Only an exact 200 is written back to the cache at request time.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }

    /// 2xx, the bar for bulk pre-population.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_offline_fallback(&self) -> bool {
        self.status == 503 && self.body.as_ref() == OFFLINE_BODY.as_bytes()
    }

    pub fn is_unsupported_fallback(&self) -> bool {
        self.status == 503 && self.body.as_ref() == UNSUPPORTED_BODY.as_bytes()
    }
}
