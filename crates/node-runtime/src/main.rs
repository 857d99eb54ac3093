//! # Block Generator Dev Node
//!
//! Runs a single-process node producing blocks from a synthetic
//! transaction feed.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`RUST_LOG`, default `info`)
//! 2. Load configuration (defaults, `BG_CONFIG` file, `BG_*` variables)
//! 3. Wire the in-memory adapters and create the head block
//! 4. Start the generator loop and the transaction feed
//! 5. Wait for Ctrl+C, then stop between ticks

use anyhow::Result;
use block_generator::ports::inbound::NodeBanApi;
use node_runtime::{load_config, DevNode};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config()?;
    let node = DevNode::new(config)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handles = node.start(shutdown_rx);

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Initiating graceful shutdown...");
    if let Err(e) = shutdown_tx.send(true) {
        error!("Failed to send shutdown signal: {}", e);
    }
    handles.join().await;

    let metrics = node.metrics();
    info!(
        blocks = metrics.get_blocks_produced(),
        avg_txs = metrics.get_avg_transactions_per_block(),
        height = node.ledger().height(),
        local_bans = node.bans().local_ban_count(),
        "Shutdown complete"
    );
    Ok(())
}
