//! # Blockview Node
//!
//! Runs the indexer in standalone mode: an in-memory Chain Store seeded with
//! a genesis block and an in-memory Node Feed.
//!
//! ## Startup Sequence
//!
//! 1. Install logging (`RUST_LOG`, default `info`)
//! 2. Load configuration from the environment and validate it
//! 3. Seed the genesis block
//! 4. Build the components and start the runtime
//! 5. Run until Ctrl+C or an authenticated shutdown command

use anyhow::{Context, Result};
use node_runtime::genesis::{GenesisBuilder, GenesisConfig};
use node_runtime::{NodeConfig, NodeContainer, NodeRuntime};
use shared_types::memory::{InMemoryChainStore, MemoryNodeFeed};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config = NodeConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let store = Arc::new(InMemoryChainStore::new());
    let genesis = GenesisBuilder::new(GenesisConfig::default())
        .seed(&store)
        .context("Failed to seed genesis block")?;
    info!(hash = %hex::encode(genesis.hash), "Genesis block stored");

    let feed = Arc::new(MemoryNodeFeed::new());
    let runtime = NodeRuntime::new(NodeContainer::new(config, store, feed));
    runtime.start().await?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            info!("Ctrl+C received");
        }
        request = runtime.shutdown_requested() => {
            info!(?request, "Shutdown requested by client");
        }
    }

    runtime.shutdown().await;
    Ok(())
}
