//! Development node wiring
//!
//! Connects the block generator to the in-memory adapters:
//!
//! ```text
//! dev feed ──► InMemoryTxQueue ──► BlockProducer ──► InMemoryLedger
//!                                       ▲
//!                       BlockGeneratorDaemon (ticks)
//! ```

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use block_generator::adapters::{
    DevTransaction, DevTransactionProcessor, InMemoryLedger, InMemoryTxQueue,
    LoggingCommitNotifier, QueuedDelayedContracts, RecordingTxGateway, StaticKeyProvider,
    StaticRegistry,
};
use block_generator::domain::NodeKeys;
use block_generator::{
    BanDependencies, BlockGeneratorDaemon, BlockProducer, ChainLock, Clock, Metrics,
    NodeBanService, ProducerDependencies, SystemClock,
};
use shared_types::{BlockHeader, ProducerNode, BLOCK_VERSION};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Payload size of synthetic transactions
const DEV_TX_PAYLOAD: usize = 32;

/// Running node tasks
pub struct NodeHandles {
    pub daemon: JoinHandle<()>,
    pub feed: Option<JoinHandle<()>>,
}

impl NodeHandles {
    /// Wait for every task to finish
    pub async fn join(self) {
        if let Err(e) = self.daemon.await {
            warn!(error = %e, "block generator task failed");
        }
        if let Some(feed) = self.feed {
            if let Err(e) = feed.await {
                warn!(error = %e, "transaction feed task failed");
            }
        }
    }
}

/// Single-process node holding every component
pub struct DevNode {
    config: NodeConfig,
    ledger: Arc<InMemoryLedger>,
    queue: Arc<InMemoryTxQueue>,
    producer: Arc<BlockProducer>,
    bans: Arc<NodeBanService>,
    metrics: Arc<Metrics>,
}

impl DevNode {
    pub fn new(config: NodeConfig) -> Result<Self> {
        let key_id = config.generator.key_id;
        let private_key = config.private_key()?;
        let keys = Arc::new(StaticKeyProvider::new(NodeKeys {
            public_key: private_key.iter().rev().copied().collect(),
            private_key,
        }));

        let nodes: Vec<ProducerNode> = config
            .producer_keys()
            .into_iter()
            .map(|key| ProducerNode {
                key_id: key,
                tcp_address: format!("127.0.0.1:{}", 7078 + key),
                api_address: format!("http://127.0.0.1:{}", 7079 + key),
                ..Default::default()
            })
            .collect();
        let registry = Arc::new(StaticRegistry::new(nodes));

        // head sits just before the first slot so slot 0 is free
        let head = BlockHeader {
            block_id: 1,
            time: config.generator.schedule.first_block_time - 1,
            ecosystem_id: 0,
            key_id,
            node_position: 0,
            version: BLOCK_VERSION,
        };
        let ledger =
            Arc::new(InMemoryLedger::with_head(head).context("creating the genesis block")?);

        let queue = Arc::new(InMemoryTxQueue::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let metrics = Arc::new(Metrics::new());

        let producer = Arc::new(BlockProducer::new(ProducerDependencies {
            ledger: ledger.clone(),
            queue: queue.clone(),
            processor: Arc::new(DevTransactionProcessor::new()),
            keys: keys.clone(),
            registry: registry.clone(),
            delayed_contracts: Arc::new(QueuedDelayedContracts::new(queue.clone())),
            notifier: Arc::new(LoggingCommitNotifier::new()),
            clock: clock.clone(),
            chain_lock: ChainLock::default(),
            metrics: metrics.clone(),
            config: config.generator.clone(),
        }));

        let bans = Arc::new(NodeBanService::new(
            BanDependencies {
                registry,
                keys,
                gateway: Arc::new(RecordingTxGateway::new()),
                clock,
            },
            key_id,
            config.generator.local_ban_time(),
        ));

        Ok(Self {
            config,
            ledger,
            queue,
            producer,
            bans,
            metrics,
        })
    }

    pub fn ledger(&self) -> &Arc<InMemoryLedger> {
        &self.ledger
    }

    pub fn queue(&self) -> &Arc<InMemoryTxQueue> {
        &self.queue
    }

    pub fn producer(&self) -> &Arc<BlockProducer> {
        &self.producer
    }

    pub fn bans(&self) -> &Arc<NodeBanService> {
        &self.bans
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Spawn the generator loop and the transaction feed
    pub fn start(&self, shutdown: watch::Receiver<bool>) -> NodeHandles {
        info!(
            key_id = self.config.generator.key_id,
            producers = self.config.producer_keys().len(),
            first_block_time = self.config.generator.schedule.first_block_time,
            "starting dev node"
        );

        let feed = (self.config.dev_tx_interval_ms > 0).then(|| {
            tokio::spawn(run_feed(
                self.queue.clone(),
                self.config.generator.key_id,
                Duration::from_millis(self.config.dev_tx_interval_ms),
                shutdown.clone(),
            ))
        });
        let daemon =
            BlockGeneratorDaemon::new(self.producer.clone(), self.config.generator.clone())
                .spawn(shutdown);

        NodeHandles { daemon, feed }
    }
}

/// Push one synthetic transaction per `interval` until shutdown
async fn run_feed(
    queue: Arc<InMemoryTxQueue>,
    key_id: i64,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    let mut nonce = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let tx = DevTransaction::contract_call(
                    key_id,
                    1,
                    chrono::Utc::now().timestamp(),
                    nonce,
                    DEV_TX_PAYLOAD,
                );
                match tx.encode() {
                    Ok(raw) => {
                        queue.push(raw);
                        debug!(nonce, "queued dev transaction");
                        nonce += 1;
                    }
                    Err(e) => warn!(error = %e, "encoding dev transaction"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("transaction feed stopped");
}
