//! The cache policy agent and its lifecycle.
//!
//! A host drives the agent through `install` (pre-populate the current
//! generation), `activate` (drop every other generation, then take control
//! of pages) and `handle_fetch` (answer one request). The generation tag and
//! asset list come from the [`Manifest`] injected at construction.

use std::fmt;

use futures::future::try_join_all;
use stowaway_client::Network;
use stowaway_core::{CacheStore, Error, Manifest, Request, Response};
use tokio::sync::RwLock;
use url::Url;

use crate::route::{Route, classify};
use crate::strategy;

/// Where the agent is in its install/activate lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, no signal received yet.
    Parsed,
    Installing,
    /// Installed and waiting to be activated.
    Installed,
    Activating,
    /// Controlling pages; requests are intercepted.
    Activated,
    /// Install failed; the agent will never control pages.
    Redundant,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        })
    }
}

/// Outcome of the install signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub generation: String,
    /// Entries stored by pre-population; 0 when it failed.
    pub precached: usize,
    /// Why pre-population failed, if it did. Install succeeds regardless.
    pub precache_error: Option<String>,
    /// The agent asks to be activated right away, preempting any older agent.
    pub skip_waiting: bool,
}

/// Outcome of the activate signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateReport {
    pub generation: String,
    /// Stale generations removed, oldest first.
    pub deleted: Vec<String>,
}

/// Intercepts a page's requests and serves them cache-first or network-first.
pub struct CachePolicyAgent<S, N> {
    store: S,
    network: N,
    manifest: Manifest,
    origin: Url,
    state: RwLock<LifecycleState>,
}

impl<S, N> CachePolicyAgent<S, N>
where
    S: CacheStore,
    N: Network,
{
    /// Build an agent for pages served from `origin`.
    pub fn new(store: S, network: N, manifest: Manifest, origin: Url) -> Self {
        Self { store, network, manifest, origin, state: RwLock::new(LifecycleState::Parsed) }
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    pub async fn is_controlling(&self) -> bool {
        self.state().await == LifecycleState::Activated
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    /// Move from `from` to `to`, or fail with `InvalidState`.
    async fn transition(&self, from: LifecycleState, to: LifecycleState, signal: &str) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if *state != from {
            return Err(Error::InvalidState(format!("cannot {signal} while {}", *state)));
        }
        *state = to;
        Ok(())
    }

    async fn set_state(&self, to: LifecycleState) {
        *self.state.write().await = to;
    }

    /// Setup: open the current generation and pre-populate it.
    ///
    /// Pre-population is all-or-nothing and its failure is tolerated. Only
    /// a store that cannot be opened fails the install, leaving the agent
    /// [`LifecycleState::Redundant`].
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.transition(LifecycleState::Parsed, LifecycleState::Installing, "install")
            .await?;
        let generation = self.manifest.generation();
        tracing::info!(generation, "installing");

        if let Err(e) = self.store.open(generation).await {
            tracing::error!(generation, error = %e, "failed to open cache; install aborted");
            self.set_state(LifecycleState::Redundant).await;
            return Err(e);
        }

        tracing::info!(generation, assets = self.manifest.assets().len(), "caching files");
        let (precached, precache_error) = match self.precache().await {
            Ok(count) => (count, None),
            Err(e) => {
                tracing::error!(generation, error = %e, "failed to cache some assets; continuing install");
                (0, Some(e.to_string()))
            }
        };

        self.set_state(LifecycleState::Installed).await;
        tracing::info!(generation, precached, "installation complete; requesting immediate activation");

        Ok(InstallReport { generation: generation.to_string(), precached, precache_error, skip_waiting: true })
    }

    /// Fetch every listed asset and store them in one batch.
    async fn precache(&self) -> Result<usize, Error> {
        let requests: Vec<Request> = self
            .manifest
            .resolve(&self.origin)?
            .into_iter()
            .map(Request::get)
            .collect();

        let responses = try_join_all(requests.iter().map(|request| async move {
            let response = self.network.fetch(request).await?;
            if !response.is_ok() {
                return Err(Error::HttpError(format!("{} returned {}", request.url(), response.status)));
            }
            Ok::<_, Error>(response)
        }))
        .await?;

        let entries: Vec<(Request, Response)> = requests.into_iter().zip(responses).collect();
        self.store
            .put_all(self.manifest.generation(), &entries)
            .await?;
        Ok(entries.len())
    }

    /// Resume an agent whose generation already exists in the store.
    ///
    /// Skips pre-population. Returns `false`, leaving the agent untouched,
    /// when the generation is missing and a real install is needed.
    pub async fn restore(&self) -> Result<bool, Error> {
        let generation = self.manifest.generation();
        let present = self
            .store
            .generations()
            .await?
            .iter()
            .any(|name| name == generation);
        if !present {
            return Ok(false);
        }
        self.transition(LifecycleState::Parsed, LifecycleState::Installed, "restore")
            .await?;
        tracing::info!(generation, "restored installed agent");
        Ok(true)
    }

    /// Cleanup: delete every generation but the current one, then claim pages.
    ///
    /// On a store failure the agent stays installed and does not claim.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.transition(LifecycleState::Installed, LifecycleState::Activating, "activate")
            .await?;
        let generation = self.manifest.generation();
        tracing::info!(generation, "activating");

        match self.delete_stale_generations().await {
            Ok(deleted) => {
                self.set_state(LifecycleState::Activated).await;
                tracing::info!(generation, deleted = deleted.len(), "activation complete; claiming clients");
                Ok(ActivateReport { generation: generation.to_string(), deleted })
            }
            Err(e) => {
                tracing::error!(generation, error = %e, "cache cleanup failed");
                self.set_state(LifecycleState::Installed).await;
                Err(e)
            }
        }
    }

    async fn delete_stale_generations(&self) -> Result<Vec<String>, Error> {
        let current = self.manifest.generation();
        let stale: Vec<String> = self
            .store
            .generations()
            .await?
            .into_iter()
            .filter(|name| name != current)
            .collect();

        let results = try_join_all(stale.iter().map(|name| async move {
            tracing::info!(generation = %name, "deleting old cache");
            self.store.delete_generation(name).await
        }))
        .await?;

        Ok(stale
            .into_iter()
            .zip(results)
            .filter_map(|(name, existed)| existed.then_some(name))
            .collect())
    }

    /// Answer one intercepted request.
    ///
    /// Returns `None` while the agent does not control pages; the host should
    /// send the request to the network itself. Once activated the answer is
    /// always a response, synthetic 503s included.
    pub async fn handle_fetch(&self, request: &Request) -> Option<Response> {
        if !self.is_controlling().await {
            tracing::debug!(url = %request.url(), "not controlling; request passes through");
            return None;
        }

        let generation = self.manifest.generation();
        let response = match classify(request, &self.origin.origin(), &self.manifest) {
            Route::Bypass(reason) => {
                tracing::debug!(url = %request.url(), method = request.method(), %reason, "bypassing cache");
                strategy::bypass(&self.network, request).await
            }
            Route::CacheFirst => strategy::cache_first(&self.store, &self.network, generation, request).await,
            Route::NetworkFirst => strategy::network_first(&self.store, &self.network, generation, request).await,
        };
        Some(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BrokenStore, ScriptedNetwork};
    use futures::future::join_all;
    use stowaway_core::CacheDb;

    const ORIGIN: &str = "https://tracker.example";
    const CDN: &str = "https://cdn.example/lib.js";

    fn manifest() -> Manifest {
        Manifest::new("app-v2", ["/app/", "/app/index.html", CDN])
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn get(s: &str) -> Request {
        Request::get(url(s))
    }

    fn online_network() -> ScriptedNetwork {
        let network = ScriptedNetwork::new();
        network.respond("https://tracker.example/app/", 200, "<html>shell</html>");
        network.respond("https://tracker.example/app/index.html", 200, "<html>index</html>");
        network.respond(CDN, 200, "lib()");
        network
    }

    async fn agent_with(network: ScriptedNetwork) -> CachePolicyAgent<CacheDb, ScriptedNetwork> {
        let store = CacheDb::open_in_memory().await.unwrap();
        CachePolicyAgent::new(store, network, manifest(), url(ORIGIN))
    }

    async fn active_agent() -> CachePolicyAgent<CacheDb, ScriptedNetwork> {
        let agent = agent_with(online_network()).await;
        agent.install().await.unwrap();
        agent.activate().await.unwrap();
        agent
    }

    #[tokio::test]
    async fn test_install_precaches_every_asset() {
        let agent = agent_with(online_network()).await;
        let report = agent.install().await.unwrap();

        assert_eq!(report.generation, "app-v2");
        assert_eq!(report.precached, 3);
        assert!(report.precache_error.is_none());
        assert!(report.skip_waiting);
        assert_eq!(agent.state().await, LifecycleState::Installed);

        for asset in agent.manifest().resolve(agent.origin()).unwrap() {
            let hit = agent.store().match_request(&Request::get(asset)).await.unwrap();
            assert!(hit.is_some());
        }
    }

    #[tokio::test]
    async fn test_precached_assets_served_without_network() {
        let agent = active_agent().await;
        let calls_after_install = agent.network().total_calls();

        let response = agent.handle_fetch(&get("https://tracker.example/app/index.html")).await.unwrap();
        assert_eq!(response.body.as_ref(), b"<html>index</html>");
        let response = agent.handle_fetch(&get("https://tracker.example/app/")).await.unwrap();
        assert_eq!(response.body.as_ref(), b"<html>shell</html>");

        assert_eq!(agent.network().total_calls(), calls_after_install);
    }

    #[tokio::test]
    async fn test_precache_is_all_or_nothing_and_non_fatal() {
        let network = online_network();
        network.respond(CDN, 404, "gone");
        let agent = agent_with(network).await;

        let report = agent.install().await.unwrap();
        assert_eq!(report.precached, 0);
        assert!(report.precache_error.is_some());
        assert_eq!(agent.store().entry_count("app-v2").await.unwrap(), 0);
        assert_eq!(agent.store().generations().await.unwrap(), vec!["app-v2".to_string()]);

        agent.activate().await.unwrap();
        assert!(agent.is_controlling().await);
    }

    #[tokio::test]
    async fn test_precache_network_failure_tolerated() {
        let network = online_network();
        network.set_offline(true);
        let agent = agent_with(network).await;

        let report = agent.install().await.unwrap();
        assert!(report.precache_error.is_some());
        assert_eq!(agent.state().await, LifecycleState::Installed);
    }

    #[tokio::test]
    async fn test_install_with_broken_store_is_redundant() {
        let agent = CachePolicyAgent::new(BrokenStore, online_network(), manifest(), url(ORIGIN));
        assert!(agent.install().await.is_err());
        assert_eq!(agent.state().await, LifecycleState::Redundant);
        assert!(agent.activate().await.is_err());
        assert!(agent.handle_fetch(&get("https://tracker.example/app/")).await.is_none());
    }

    #[tokio::test]
    async fn test_install_twice_is_rejected() {
        let agent = agent_with(online_network()).await;
        agent.install().await.unwrap();
        assert!(matches!(agent.install().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_activate_before_install_is_rejected() {
        let agent = agent_with(online_network()).await;
        assert!(matches!(agent.activate().await, Err(Error::InvalidState(_))));
        assert_eq!(agent.state().await, LifecycleState::Parsed);
    }

    #[tokio::test]
    async fn test_activate_deletes_stale_generations() {
        let agent = agent_with(online_network()).await;
        let old = get("https://tracker.example/app/index.html");
        agent.store().put("app-v0", &old, &Response::new(200, "OK", "v0")).await.unwrap();
        agent.store().open("app-v1").await.unwrap();

        agent.install().await.unwrap();
        let report = agent.activate().await.unwrap();

        assert_eq!(report.deleted, vec!["app-v0".to_string(), "app-v1".to_string()]);
        assert_eq!(agent.store().generations().await.unwrap(), vec!["app-v2".to_string()]);
        assert_eq!(agent.store().entry_count("app-v0").await.unwrap(), 0);
        assert_eq!(agent.state().await, LifecycleState::Activated);
    }

    #[tokio::test]
    async fn test_not_controlling_before_activation() {
        let agent = agent_with(online_network()).await;
        assert!(agent.handle_fetch(&get("https://tracker.example/app/")).await.is_none());

        agent.install().await.unwrap();
        assert!(agent.handle_fetch(&get("https://tracker.example/app/")).await.is_none());

        agent.activate().await.unwrap();
        assert!(agent.handle_fetch(&get("https://tracker.example/app/")).await.is_some());
    }

    #[tokio::test]
    async fn test_restore_requires_existing_generation() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let agent = CachePolicyAgent::new(store.clone(), online_network(), manifest(), url(ORIGIN));
        assert!(!agent.restore().await.unwrap());
        assert_eq!(agent.state().await, LifecycleState::Parsed);

        store.open("app-v2").await.unwrap();
        assert!(agent.restore().await.unwrap());
        assert_eq!(agent.state().await, LifecycleState::Installed);
        assert_eq!(agent.network().total_calls(), 0);

        agent.activate().await.unwrap();
        assert!(agent.is_controlling().await);
    }

    #[tokio::test]
    async fn test_listed_asset_miss_fetches_exactly_once() {
        let network = online_network();
        network.set_offline(true);
        let agent = agent_with(network).await;
        agent.install().await.unwrap();
        agent.activate().await.unwrap();
        agent.network().set_offline(false);

        let target = "https://tracker.example/app/index.html";
        let before = agent.network().calls_to(target);
        let first = agent.handle_fetch(&get(target)).await.unwrap();
        let second = agent.handle_fetch(&get(target)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(agent.network().calls_to(target) - before, 1);
    }

    #[tokio::test]
    async fn test_listed_asset_offline_without_cache() {
        let network = online_network();
        network.set_offline(true);
        let agent = agent_with(network).await;
        agent.install().await.unwrap();
        agent.activate().await.unwrap();

        let response = agent.handle_fetch(&get("https://tracker.example/app/")).await.unwrap();
        assert!(response.is_offline_fallback());
    }

    #[tokio::test]
    async fn test_unlisted_request_network_first_then_fallback() {
        let agent = active_agent().await;
        let target = "https://tracker.example/app/stats.json";
        agent.network().respond(target, 200, "{\"applied\":3}");

        let online = agent.handle_fetch(&get(target)).await.unwrap();
        assert_eq!(online.status, 200);

        agent.network().set_offline(true);
        let offline = agent.handle_fetch(&get(target)).await.unwrap();
        assert_eq!(offline, online);

        let never_seen = agent.handle_fetch(&get("https://tracker.example/app/other.json")).await.unwrap();
        assert!(never_seen.is_offline_fallback());
    }

    #[tokio::test]
    async fn test_query_string_is_part_of_request_identity() {
        let agent = active_agent().await;
        agent.network().set_offline(true);

        let response = agent
            .handle_fetch(&get("https://tracker.example/app/index.html?v=2"))
            .await
            .unwrap();
        assert!(response.is_offline_fallback());
    }

    #[tokio::test]
    async fn test_fragment_still_matches_precached_asset() {
        let agent = active_agent().await;
        agent.network().set_offline(true);

        let response = agent
            .handle_fetch(&get("https://tracker.example/app/index.html#top"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body.as_ref(), b"<html>index</html>");
    }

    #[tokio::test]
    async fn test_bypassed_post_forwards_headers_and_body() {
        let agent = active_agent().await;
        let target = "https://tracker.example/api/jobs";
        agent.network().respond(target, 200, "created");

        let post = Request::new("POST", url(target))
            .with_header("content-type", "application/json")
            .with_body("{\"company\":\"Acme\"}");
        let response = agent.handle_fetch(&post).await.unwrap();
        assert_eq!(response.body.as_ref(), b"created");

        let sent = agent.network().last_request_to(target).unwrap();
        assert_eq!(sent, post);
        assert_eq!(sent.body().map(|b| b.as_ref()), Some(&b"{\"company\":\"Acme\"}"[..]));
        assert!(agent.store().match_request(&post).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_post_never_touches_cache() {
        let agent = active_agent().await;
        let target = url("https://tracker.example/app/index.html");
        agent.network().respond(target.as_str(), 200, "posted");

        let post = Request::new("POST", target.clone());
        let response = agent.handle_fetch(&post).await.unwrap();
        assert_eq!(response.body.as_ref(), b"posted");
        assert!(agent.store().match_request(&post).await.unwrap().is_none());

        let cached_get = agent.store().match_request(&Request::get(target)).await.unwrap().unwrap();
        assert_eq!(cached_get.body.as_ref(), b"<html>index</html>");

        agent.network().set_offline(true);
        let response = agent.handle_fetch(&post).await.unwrap();
        assert!(response.is_unsupported_fallback());
    }

    #[tokio::test]
    async fn test_cross_origin_goes_to_network_unconditionally() {
        let agent = active_agent().await;
        let before = agent.network().calls_to(CDN);

        let response = agent.handle_fetch(&get(CDN)).await.unwrap();
        assert_eq!(response.body.as_ref(), b"lib()");
        assert_eq!(agent.network().calls_to(CDN) - before, 1);

        agent.network().set_offline(true);
        let response = agent.handle_fetch(&get(CDN)).await.unwrap();
        assert!(response.is_unsupported_fallback());
        assert!(!response.is_offline_fallback());
    }

    #[tokio::test]
    async fn test_concurrent_requests() {
        let agent = active_agent().await;
        for i in 0..8 {
            agent
                .network()
                .respond(&format!("https://tracker.example/api/{i}"), 200, "item");
        }

        let requests: Vec<Request> = (0..8)
            .map(|i| get(&format!("https://tracker.example/api/{i}")))
            .collect();
        let responses = join_all(requests.iter().map(|r| agent.handle_fetch(r))).await;

        assert!(responses.iter().all(|r| r.as_ref().map(|r| r.status) == Some(200)));
        assert_eq!(agent.store().entry_count("app-v2").await.unwrap(), 3 + 8);
    }

    #[tokio::test]
    async fn test_builtin_manifest_install() {
        let origin = url("https://someone.github.io");
        let network = ScriptedNetwork::new();
        let manifest = Manifest::builtin();
        for asset in manifest.resolve(&origin).unwrap() {
            network.respond(asset.as_str(), 200, "asset");
        }
        let store = CacheDb::open_in_memory().await.unwrap();
        let agent = CachePolicyAgent::new(store, network, manifest, origin);

        let report = agent.install().await.unwrap();
        assert_eq!(report.generation, "job-tracker-cache-v1");
        assert_eq!(report.precached, 14);
    }
}
