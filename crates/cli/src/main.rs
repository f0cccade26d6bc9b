//! stowaway command-line host.
//!
//! Drives the cache policy agent against the SQLite store and the live
//! network. Logging goes to stderr so command output on stdout stays clean.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "stowaway")]
#[command(about = "Offline-first request cache for a single-page app")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pre-populate the current generation, then activate
    Install,

    /// Activate an already installed generation, removing older ones
    Activate,

    /// Route requests through the agent and print what it answers
    Fetch {
        /// URLs to request; relative ones resolve against the configured origin
        #[arg(required = true)]
        urls: Vec<String>,

        /// Request method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Extra request header, as "Name: value"; repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body
        #[arg(short, long)]
        data: Option<String>,

        /// Print response bodies
        #[arg(long)]
        body: bool,
    },

    /// List cache generations and their entry counts
    Caches,
}

fn init_logging(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if json { builder.json().init() } else { builder.init() }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let config = stowaway_core::AppConfig::load()?;
    tracing::debug!(db_path = %config.db_path.display(), origin = %config.origin, "configuration loaded");

    match cli.command {
        Command::Install => commands::install(&config).await,
        Command::Activate => commands::activate(&config).await,
        Command::Fetch { urls, method, headers, data, body } => {
            let options = commands::FetchOptions { method, headers, data, print_body: body };
            commands::fetch(&config, &urls, &options).await
        }
        Command::Caches => commands::caches(&config).await,
    }
}
