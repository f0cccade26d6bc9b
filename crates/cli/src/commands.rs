//! Subcommand implementations.

use anyhow::{Context, Result, bail};
use stowaway_agent::CachePolicyAgent;
use stowaway_client::{FetchClient, FetchConfig, resolve};
use stowaway_core::{AppConfig, CacheDb, CacheStore, Manifest, Request, Response};
use url::Url;

type Agent = CachePolicyAgent<CacheDb, FetchClient>;

async fn build_agent(config: &AppConfig) -> Result<Agent> {
    let store = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache database {}", config.db_path.display()))?;
    let network = FetchClient::new(FetchConfig::from(config))?;
    let origin = config.origin_url()?;
    Ok(CachePolicyAgent::new(store, network, Manifest::builtin(), origin))
}

/// Restore the registration if its generation exists, otherwise install.
async fn bring_up(agent: &Agent) -> Result<()> {
    if !agent.restore().await? {
        let report = agent.install().await?;
        if let Some(reason) = report.precache_error {
            eprintln!("warning: pre-population failed: {reason}");
        }
    }
    agent.activate().await?;
    Ok(())
}

pub async fn install(config: &AppConfig) -> Result<()> {
    let agent = build_agent(config).await?;
    let report = agent.install().await?;

    match &report.precache_error {
        None => println!("installed {} ({} assets cached)", report.generation, report.precached),
        Some(reason) => println!("installed {} (pre-population failed: {reason})", report.generation),
    }

    if report.skip_waiting {
        let activated = agent.activate().await?;
        print_activation(&activated.generation, &activated.deleted);
    }
    Ok(())
}

pub async fn activate(config: &AppConfig) -> Result<()> {
    let agent = build_agent(config).await?;
    if !agent.restore().await? {
        bail!("generation {} is not installed; run `stowaway install` first", agent.manifest().generation());
    }
    let report = agent.activate().await?;
    print_activation(&report.generation, &report.deleted);
    Ok(())
}

fn print_activation(generation: &str, deleted: &[String]) {
    if deleted.is_empty() {
        println!("activated {generation}");
    } else {
        println!("activated {generation} (deleted {})", deleted.join(", "));
    }
}

/// How `fetch` builds and reports each request.
pub struct FetchOptions {
    pub method: String,
    pub headers: Vec<String>,
    pub data: Option<String>,
    pub print_body: bool,
}

impl FetchOptions {
    fn request(&self, url: Url) -> Result<Request> {
        let mut request = Request::new(&self.method, url);
        for raw in &self.headers {
            let (name, value) = parse_header(raw)?;
            request = request.with_header(name, value);
        }
        if let Some(data) = &self.data {
            request = request.with_body(data.clone());
        }
        Ok(request)
    }
}

fn parse_header(raw: &str) -> Result<(&str, &str)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value.trim())),
        _ => bail!("invalid header {raw:?}; expected \"Name: value\""),
    }
}

pub async fn fetch(config: &AppConfig, urls: &[String], options: &FetchOptions) -> Result<()> {
    let agent = build_agent(config).await?;
    bring_up(&agent).await?;

    for input in urls {
        let url = resolve(input, agent.origin()).with_context(|| format!("resolving {input}"))?;
        let request = options.request(url)?;
        let Some(response) = agent.handle_fetch(&request).await else {
            bail!("agent is {} and not controlling requests", agent.state().await);
        };
        println!("{}", summary_line(&request, &response));
        if options.print_body {
            println!("{}", String::from_utf8_lossy(&response.body));
        }
    }
    Ok(())
}

fn summary_line(request: &Request, response: &Response) -> String {
    format!("{} {} {} {}", response.status, response.status_text, response.body.len(), request.url())
}

pub async fn caches(config: &AppConfig) -> Result<()> {
    let store = CacheDb::open(&config.db_path).await?;
    let current = Manifest::builtin();

    for name in store.generations().await? {
        let count = store.entry_count(&name).await?;
        let marker = if name == current.generation() { "*" } else { " " };
        println!("{marker} {name} {count}");
    }
    Ok(())
}
