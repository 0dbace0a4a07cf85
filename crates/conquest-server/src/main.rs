//! Conquest Multiplayer Server
//!
//! Serves sessions over newline-delimited JSON on TCP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use conquest_core::{load_map, MapSource};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use conquest_server::{spawn_ticker, transport, GameService, ServerConfig};

#[derive(Parser)]
#[command(name = "conquest-server")]
#[command(about = "Multiplayer server for the province conquest game", long_about = None)]
#[command(version)]
struct Cli {
    /// YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the config file
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Map file, overriding the config file
    #[arg(short, long)]
    map: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("conquest_server=debug,conquest_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("conquest_server=info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    if let Some(map) = cli.map {
        config.map_path = Some(map);
    }
    config.validate().context("invalid configuration")?;

    let source = match &config.map_path {
        Some(path) => MapSource::Path(path.display().to_string()),
        None => MapSource::Embedded,
    };
    let map = load_map(source).context("loading map")?;
    for (from, to) in map.asymmetric_links() {
        warn!("Map link {} -> {} is one-sided; treating it as mutual", from, to);
    }
    info!("Loaded map with {} regions", map.len());

    let service = Arc::new(GameService::new(&config, Arc::new(map)));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ticker = spawn_ticker(
        Arc::clone(&service),
        config.tick_interval(),
        shutdown_rx.clone(),
    );

    let listener = transport::bind(config.bind_address).await?;
    info!("Conquest Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}", config.bind_address);

    let server = tokio::spawn(transport::serve(listener, Arc::clone(&service), shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutting down");

    // Err only if both tasks already exited
    let _ = shutdown_tx.send(true);
    server.await.context("transport task panicked")??;
    ticker.await.context("ticker task panicked")?;

    info!("Stopped with {} live sessions", service.session_count());
    Ok(())
}
