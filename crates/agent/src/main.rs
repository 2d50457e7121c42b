//! Podlens agent - scrape, sweep, and query roles
//!
//! Each role runs as its own process in the cluster and exposes health
//! and Prometheus metrics next to its work.

use anyhow::Result;
use clap::{Parser, Subcommand};
use podlens_lib::Settings;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod roles;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Podlens agent
#[derive(Parser)]
#[command(name = "podlens-agent")]
#[command(author, version, about = "Pod metrics knowledge base for Kubernetes", long_about = None)]
struct Cli {
    /// Port for health, metrics, and (in serve mode) queries; overrides PODLENS_LISTEN_PORT
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Periodically collect pod metrics, embed them, and ingest them
    Scrape,

    /// Periodically delete objects older than the retention window
    Sweep,

    /// Answer natural-language questions over HTTP
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(port) = cli.port {
        settings.listen_port = port;
    }
    info!(
        version = AGENT_VERSION,
        dev = settings.dev,
        ext = settings.ext,
        listen_port = settings.listen_port,
        "Podlens configured"
    );

    match cli.command {
        Command::Scrape => roles::scrape(settings).await,
        Command::Sweep => roles::sweep(settings).await,
        Command::Serve => roles::serve(settings).await,
    }
}
