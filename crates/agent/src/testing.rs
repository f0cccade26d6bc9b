//! Test doubles for the network and store seams.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use stowaway_client::Network;
use stowaway_core::{CacheStore, Error, Request, Response};

/// In-memory network with canned responses keyed by URL.
///
/// Unknown URLs and everything while offline fail with `Error::Network`.
/// Every call is recorded, including failed ones.
#[derive(Default)]
pub(crate) struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<Request>>,
    offline: AtomicBool,
}

impl ScriptedNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, url: &str, status: u16, body: &'static str) {
        let reason = match status {
            200 => "OK",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "",
        };
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Response::new(status, reason, body));
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.url().as_str() == url).count()
    }

    /// The most recent request sent to `url`, as the network saw it.
    pub(crate) fn last_request_to(&self, url: &str) -> Option<Request> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.url().as_str() == url)
            .cloned()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url().to_string();
        self.calls.lock().unwrap().push(request.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {url}")));
        }
        self.routes
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .ok_or_else(|| Error::Network(format!("no route to {url}")))
    }
}

/// Store whose every operation fails.
pub(crate) struct BrokenStore;

fn broken() -> Error {
    Error::InvalidState("store unavailable".into())
}

#[async_trait]
impl CacheStore for BrokenStore {
    async fn open(&self, _generation: &str) -> Result<(), Error> {
        Err(broken())
    }

    async fn generations(&self) -> Result<Vec<String>, Error> {
        Err(broken())
    }

    async fn delete_generation(&self, _generation: &str) -> Result<bool, Error> {
        Err(broken())
    }

    async fn match_request(&self, _request: &Request) -> Result<Option<Response>, Error> {
        Err(broken())
    }

    async fn put(&self, _generation: &str, _request: &Request, _response: &Response) -> Result<(), Error> {
        Err(broken())
    }

    async fn put_all(&self, _generation: &str, _entries: &[(Request, Response)]) -> Result<(), Error> {
        Err(broken())
    }
}
