//! Block producer
//!
//! One call to [`BlockProducer::try_generate`] is one tick:
//!
//! ```text
//! paused? ─► position? ─► slot free & ours? ─► lock ─► re-check ─► head
//!     ─► deadline ─► keys + delayed contracts ─► admission ─► assemble ─► persist
//! ```
//!
//! Everything from reading the head to persisting the block runs under the
//! chain lock. Nothing is written unless the whole block is.

use super::admission::TransactionAdmission;
use super::chain_lock::ChainLock;
use super::deadline::Deadline;
use crate::config::BlockGeneratorConfig;
use crate::domain::{validate_candidate, GenerationOutcome, LeaderSchedule, SkipReason};
use crate::error::{GeneratorError, Result};
use crate::metrics::Metrics;
use crate::ports::{
    BlockLedger, BlockProducerApi, Clock, CommitNotifier, DelayedContractRunner, KeyProvider,
    PendingTxQueue, ProducerRegistry, TransactionProcessor,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::{Block, BlockHeader, BLOCK_VERSION};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Dependencies for BlockProducer
pub struct ProducerDependencies {
    pub ledger: Arc<dyn BlockLedger>,
    pub queue: Arc<dyn PendingTxQueue>,
    pub processor: Arc<dyn TransactionProcessor>,
    pub keys: Arc<dyn KeyProvider>,
    pub registry: Arc<dyn ProducerRegistry>,
    pub delayed_contracts: Arc<dyn DelayedContractRunner>,
    pub notifier: Arc<dyn CommitNotifier>,
    pub clock: Arc<dyn Clock>,
    pub chain_lock: ChainLock,
    pub metrics: Arc<Metrics>,
    pub config: BlockGeneratorConfig,
}

/// Produces the next block when this node owns the current slot
pub struct BlockProducer {
    ledger: Arc<dyn BlockLedger>,
    keys: Arc<dyn KeyProvider>,
    registry: Arc<dyn ProducerRegistry>,
    delayed_contracts: Arc<dyn DelayedContractRunner>,
    notifier: Arc<dyn CommitNotifier>,
    clock: Arc<dyn Clock>,
    chain_lock: ChainLock,
    metrics: Arc<Metrics>,
    admission: TransactionAdmission,
    config: BlockGeneratorConfig,
    paused: AtomicBool,
}

impl BlockProducer {
    pub fn new(deps: ProducerDependencies) -> Self {
        let admission =
            TransactionAdmission::new(deps.queue, deps.processor, deps.config.limits.clone());
        Self {
            ledger: deps.ledger,
            keys: deps.keys,
            registry: deps.registry,
            delayed_contracts: deps.delayed_contracts,
            notifier: deps.notifier,
            clock: deps.clock,
            chain_lock: deps.chain_lock,
            metrics: deps.metrics,
            admission,
            config: deps.config,
            paused: AtomicBool::new(false),
        }
    }

    /// Collected counters
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    fn skipped(&self, reason: SkipReason) -> GenerationOutcome {
        debug!(?reason, "no block this tick");
        self.metrics.record_skip();
        GenerationOutcome::Skipped(reason)
    }

    /// Slot guard: `None` when we may generate at `now`, otherwise why not
    async fn slot_guard(
        &self,
        schedule: &LeaderSchedule,
        position: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<SkipReason>> {
        if schedule
            .block_for_time_exists(self.ledger.as_ref(), now, position)
            .await?
        {
            return Ok(Some(SkipReason::SlotAlreadyFilled));
        }
        if !schedule.time_to_generate(now, position)? {
            return Ok(Some(SkipReason::NotOurSlot));
        }
        Ok(None)
    }

    fn schedule(&self) -> Result<LeaderSchedule> {
        LeaderSchedule::from_config(&self.config.schedule, self.registry.nodes().len())
    }

    fn spawn_post_commit(&self, header: BlockHeader) {
        if !self.config.post_commit_notifications {
            return;
        }
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            let block_id = header.block_id;
            if let Err(e) = notifier.block_committed(header).await {
                warn!(block_id, error = %e, "post-commit notification failed");
            }
        });
    }
}

#[async_trait]
impl BlockProducerApi for BlockProducer {
    #[tracing::instrument(skip(self), fields(key_id = self.config.key_id))]
    async fn try_generate(&self) -> Result<GenerationOutcome> {
        if self.is_paused() {
            return Ok(GenerationOutcome::Paused);
        }
        self.metrics.record_attempt();

        let key_id = self.config.key_id;
        let position = match self.registry.node_position_by_key_id(key_id) {
            Ok(position) => position,
            Err(e) => {
                debug!(error = %e, "not a block producer");
                return Ok(GenerationOutcome::NotEligible);
            }
        };

        let schedule = self.schedule()?;
        if let Some(reason) = self.slot_guard(&schedule, position, self.clock.now()).await? {
            return Ok(self.skipped(reason));
        }

        let _guard = self.chain_lock.acquire().await;

        // the producer list may have changed while waiting for the lock
        let position = self.registry.node_position_by_key_id(key_id)?;
        let schedule = self.schedule()?;
        let now = self.clock.now();
        if let Some(reason) = self.slot_guard(&schedule, position, now).await? {
            return Ok(self.skipped(reason));
        }

        let Some(head) = self.ledger.last_block().await? else {
            return Ok(self.skipped(SkipReason::NoChainHead));
        };

        let (_, slot_end) = schedule.range_by_time(now)?;
        let remaining = (slot_end - now).to_std().unwrap_or_default();
        let deadline = Deadline::after(remaining);

        let keys = self.keys.node_keys()?;
        if keys.private_key.is_empty() {
            return Err(GeneratorError::MissingKeys("node private key is empty".to_string()));
        }

        let block_id = head.header.block_id + 1;
        self.delayed_contracts.run_for_block_id(block_id, &keys).await?;

        let report = self.admission.run(&deadline, now).await?;
        self.metrics.record_admission(&report);
        if report.transactions.is_empty() {
            return Ok(self.skipped(SkipReason::NoTransactions));
        }

        // stamped with the attempt start so the block stays inside its slot
        let header = BlockHeader {
            block_id,
            time: now.timestamp(),
            ecosystem_id: 0,
            key_id,
            node_position: position,
            version: BLOCK_VERSION,
        };
        validate_candidate(&head, &header, &report.transactions)?;

        let tx_count = report.transactions.len();
        let block = Block {
            header: header.clone(),
            transactions: report.transactions,
        };
        let bytes = block
            .marshal()
            .map_err(|e| GeneratorError::Serialization(e.to_string()))?;

        self.ledger.insert_block(bytes, true, false).await?;
        self.metrics.record_block_produced(tx_count);
        info!(block_id, tx_count, position, "block generated");

        self.spawn_post_commit(header.clone());
        Ok(GenerationOutcome::Produced { header, tx_count })
    }

    fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            info!("block generation paused");
        }
    }

    fn resume(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            info!("block generation resumed");
        }
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}
