//! Worker binary: runs the expiry scheduler against the shared store.
//!
//! Exactly one instance of this process should run per deployment; the
//! request-serving collaborators embed the library directly instead.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;

use balloon_core::config::Config;
use balloon_core::db;
use balloon_core::services::scheduler;

#[derive(Parser, Debug)]
#[command(name = "balloon-core", about = "Balloon expiry scheduler worker")]
struct Cli {
    /// Path to the SQLite database (overrides config and BALLOON_DB)
    #[arg(long)]
    db: Option<std::path::PathBuf>,

    /// Seconds between expiry sweeps
    #[arg(long)]
    sweep_interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    if let Some(db_path) = cli.db {
        config.database_path = db_path;
    }
    if let Some(secs) = cli.sweep_interval {
        config.sweep_interval_secs = secs;
    }

    log::info!(
        "Starting balloon-core worker (db: {}, sweep every {}s)",
        config.database_path.display(),
        config.sweep_interval_secs
    );

    let pool = db::open_pool(&config.database_path).await?;
    db::schema::ensure_schema(&pool).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(scheduler::run(
        pool.clone(),
        Duration::from_secs(config.sweep_interval_secs),
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    log::info!("Shutdown signal received");

    shutdown_tx.send(true).ok();
    worker.await.context("Scheduler task panicked")?;
    pool.close().await;

    Ok(())
}
