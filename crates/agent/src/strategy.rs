//! The three ways an intercepted request gets answered.
//!
//! Every path ends in a response. Network failures become a cache
//! fallback or a synthetic 503; store failures are logged and treated as
//! a miss (reads) or ignored (writes).

use stowaway_client::Network;
use stowaway_core::{CacheStore, Request, Response};

/// Forward to the network; 503 "Request not supported" if it fails.
pub(crate) async fn bypass<N>(network: &N, request: &Request) -> Response
where
    N: Network + ?Sized,
{
    match network.fetch(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(url = %request.url(), method = request.method(), error = %e, "bypassed fetch failed");
            Response::unsupported()
        }
    }
}

/// Serve a cached copy if one exists, otherwise fetch and keep a 200.
pub(crate) async fn cache_first<S, N>(store: &S, network: &N, generation: &str, request: &Request) -> Response
where
    S: CacheStore + ?Sized,
    N: Network + ?Sized,
{
    if let Some(cached) = lookup(store, request).await {
        tracing::info!(url = %request.url(), "serving from cache");
        return cached;
    }

    tracing::info!(url = %request.url(), "fetching from network");
    match network.fetch(request).await {
        Ok(response) => {
            if response.is_cacheable() {
                store_copy(store, generation, request, &response).await;
            }
            response
        }
        Err(e) => {
            tracing::error!(url = %request.url(), error = %e, "fetch failed");
            Response::offline()
        }
    }
}

/// Fetch first and keep a 200; fall back to any cached copy on failure.
pub(crate) async fn network_first<S, N>(store: &S, network: &N, generation: &str, request: &Request) -> Response
where
    S: CacheStore + ?Sized,
    N: Network + ?Sized,
{
    match network.fetch(request).await {
        Ok(response) => {
            if response.is_cacheable() {
                store_copy(store, generation, request, &response).await;
            }
            response
        }
        Err(e) => {
            tracing::error!(url = %request.url(), error = %e, "network fetch failed");
            match lookup(store, request).await {
                Some(cached) => {
                    tracing::info!(url = %request.url(), "serving from cache (fallback)");
                    cached
                }
                None => Response::offline(),
            }
        }
    }
}

async fn lookup<S>(store: &S, request: &Request) -> Option<Response>
where
    S: CacheStore + ?Sized,
{
    match store.match_request(request).await {
        Ok(hit) => hit,
        Err(e) => {
            tracing::warn!(url = %request.url(), error = %e, "cache lookup failed; treating as miss");
            None
        }
    }
}

async fn store_copy<S>(store: &S, generation: &str, request: &Request, response: &Response)
where
    S: CacheStore + ?Sized,
{
    match store.put(generation, request, response).await {
        Ok(()) => tracing::debug!(url = %request.url(), generation, "cached response"),
        Err(e) => tracing::warn!(url = %request.url(), generation, error = %e, "failed to cache response"),
    }
}
