//! Reef monitoring dashboard
//!
//! Serves the telemetry API and relays the underwater camera to browsers.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reefwatch::{
    config::AppConfig,
    store::SqliteStore,
    ui::{AppState, WebServer},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind the HTTP server to
    #[arg(long)]
    bind: Option<String>,

    /// HTTP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Camera snapshot URL
    #[arg(long)]
    upstream_url: Option<String>,

    /// SQLite database file
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref()).context("loading config")?;
    if let Some(bind) = args.bind {
        config.ui.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.ui.http_port = port;
    }
    if let Some(url) = args.upstream_url {
        config.upstream.url = url;
    }
    if let Some(database) = args.database {
        config.store.database = database;
    }
    config.validate()?;

    tracing::info!("Starting reef dashboard");
    tracing::info!(
        scope = ?config.relay.lifecycle_scope,
        fanout = ?config.relay.fanout,
        "Relay mode"
    );

    let store = SqliteStore::open(&config.store.database)
        .with_context(|| format!("opening {}", config.store.database.display()))?;
    tracing::info!("Telemetry database: {}", store.path().display());

    let ui_config = config.ui.clone();
    let state = Arc::new(AppState::new(config, Arc::new(store))?);

    WebServer::new(ui_config, state)
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
        })
        .await?;

    Ok(())
}
