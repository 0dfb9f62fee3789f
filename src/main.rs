//! BizDesk API Server
//!
//! Run with: cargo run --bin bizdesk -- --config bizdesk.toml
//!
//! Without `--config` the first config file found in the default locations
//! is used. `BIZDESK_*` environment variables override file values and
//! `RUST_LOG` overrides the configured log level.

use anyhow::Context;
use bizdesk::api::{serve, AppState};
use bizdesk::buckets::ObjectStore;
use bizdesk::config::Config;
use bizdesk::tables::TableStore;
use bizdesk::vault::FallbackStore;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "bizdesk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "BizDesk API server")]
struct Args {
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load_default(),
    };

    bizdesk::logging::init(&config.logging).context("initializing logging")?;

    tracing::info!("Starting BizDesk API server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Data directory: {:?}", config.data_dir());

    let vault = Arc::new(FallbackStore::open(config.vault_config()).await);
    tracing::info!("Vault tiers: {}", vault.stats().await);
    let backup_task = vault.start_background_backup();

    let tables = TableStore::open(&config.tables_path())
        .with_context(|| format!("opening table database {}", config.tables_path().display()))?;
    let objects = ObjectStore::open(
        config.buckets_dir(),
        &config.buckets.names,
        config.buckets.max_object_mb * 1024 * 1024,
    )
    .await
    .context("preparing object buckets")?;

    if config.api.api_token.is_none() {
        tracing::warn!("No API token configured, /api/v1 is open to anyone who can reach it");
    }

    let state = AppState::new(
        Arc::clone(&vault),
        Arc::new(tables),
        Arc::new(objects),
        config.api.clone(),
    );
    serve(state, &config.api).await.context("running API server")?;

    tracing::info!("Taking final backup...");
    let backed_up = vault.shutdown().await;
    backup_task.abort();
    tracing::info!(backed_up, "BizDesk API server stopped");

    Ok(())
}
