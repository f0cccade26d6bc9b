//! Per-request strategy selection.

use std::fmt;

use stowaway_client::is_fetchable_scheme;
use stowaway_core::{Manifest, Request};
use url::Origin;

/// Why a request skips the cache entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    NonGet,
    UnsupportedScheme,
    CrossOrigin,
}

impl fmt::Display for BypassReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BypassReason::NonGet => "non-GET method",
            BypassReason::UnsupportedScheme => "unsupported scheme",
            BypassReason::CrossOrigin => "cross-origin",
        })
    }
}

/// How an intercepted request will be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Forward to the network untouched; 503 "Request not supported" on failure.
    Bypass(BypassReason),
    /// Listed asset: cache, then network.
    CacheFirst,
    /// Anything else: network, then cache.
    NetworkFirst,
}

/// Pick the route for a request issued by a page on `origin`.
///
/// Guards run first (method, scheme, origin), then manifest membership.
pub fn classify(request: &Request, origin: &Origin, manifest: &Manifest) -> Route {
    if !request.is_get() {
        return Route::Bypass(BypassReason::NonGet);
    }
    let url = request.url();
    if !is_fetchable_scheme(url) {
        return Route::Bypass(BypassReason::UnsupportedScheme);
    }
    if &url.origin() != origin {
        return Route::Bypass(BypassReason::CrossOrigin);
    }
    if manifest.contains(url) { Route::CacheFirst } else { Route::NetworkFirst }
}
