//! The cache storage seam.

use async_trait::async_trait;

use crate::http::{Request, Response};
use crate::Error;

/// Request-matching cache storage with named generations.
///
/// Mirrors what a browser hands a service worker: open a named cache,
/// enumerate and delete caches, match a request across all of them, and
/// write responses into one. Implementations must tolerate concurrent
/// calls for the same key.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the generation if it does not exist yet.
    async fn open(&self, generation: &str) -> Result<(), Error>;

    /// All generation names, oldest first.
    async fn generations(&self) -> Result<Vec<String>, Error>;

    /// Remove a generation and everything stored under it.
    ///
    /// Returns whether the generation existed.
    async fn delete_generation(&self, generation: &str) -> Result<bool, Error>;

    /// Look the request up across every generation, oldest first.
    async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error>;

    /// Store (or overwrite) one entry, opening the generation if needed.
    async fn put(&self, generation: &str, request: &Request, response: &Response) -> Result<(), Error>;

    /// Store a batch of entries in one atomic write.
    async fn put_all(&self, generation: &str, entries: &[(Request, Response)]) -> Result<(), Error>;
}
