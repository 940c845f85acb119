#![warn(clippy::all)]

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};

mod chain;
mod config;
mod database;
mod error;
mod monitoring;
mod pool;
mod sources;
#[cfg(test)]
mod test_support;

use config::Config;
use database::{StatusStore, StatusStoreImpl};
use monitoring::{Collaborators, MonitoringScheduler, StatusReporter};
use sources::{RespCache, SqlChainStore};

/// Liveness monitoring for the explorer data platform
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the config file; created with defaults if missing
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_tracing(LevelFilter::INFO);

    let config = Config::from_config(cli.config.as_deref())?;
    if cli.print_config {
        println!("{config}");
        return Ok(());
    }

    let status_pool = pool::open_pool(&config.database.status_path, config.database.pool_size).await?;
    database::initialize_database(&*status_pool.get().await?).await?;
    let status_store: Arc<dyn StatusStore> = Arc::new(StatusStoreImpl::new_from_pool(status_pool));

    let chain_pool = pool::open_pool(&config.database.chain_path, config.database.pool_size).await?;
    let chain_store = Arc::new(SqlChainStore::new_from_pool(chain_pool));

    let probes = monitoring::build_probes(
        &config,
        Collaborators {
            primary: chain_store.clone(),
            secondary: chain_store,
            cache: Arc::new(RespCache::new(config.cache.endpoint.clone())),
            status_store: status_store.clone(),
        },
    )?;

    let token = CancellationToken::new();
    let scheduler = MonitoringScheduler::new(
        StatusReporter::new(status_store, config.database.store_timeout),
        token.clone(),
    );
    let handles = scheduler.start(probes);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, stopping probes");
    token.cancel();
    futures::future::join_all(handles).await;
    info!("All probes stopped");

    Ok(())
}
