//! Transaction admission
//!
//! Drains the pending queue in FIFO order until it is exhausted, the slot
//! deadline fires, or the block is full. Each dequeued item is either
//! admitted, marked bad, or deferred with an attempt-count bump.
//!
//! The bookkeeping writes (mark bad, bump attempts) go to two worker tasks
//! over unbounded channels so the drain loop never waits on them. Both
//! workers are joined before [`TransactionAdmission::run`] returns.

use super::deadline::Deadline;
use crate::config::LimitsConfig;
use crate::domain::{AdmissionReport, DrainStop, LimitVerdict, ResourceLimiter};
use crate::error::Result;
use crate::ports::{PendingTxQueue, TransactionProcessor};
use chrono::{DateTime, Utc};
use shared_types::TxHash;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Message recorded for a transaction that exceeds the block on its own
pub const EXCEEDS_BLOCK_LIMITS: &str = "transaction alone exceeds block limits";

/// Queue drain bounded by a slot deadline and per-block quotas
pub struct TransactionAdmission {
    queue: Arc<dyn PendingTxQueue>,
    processor: Arc<dyn TransactionProcessor>,
    limits: LimitsConfig,
}

struct SideEffects {
    bad: UnboundedSender<(TxHash, String)>,
    attempts: UnboundedSender<TxHash>,
}

impl SideEffects {
    fn mark_bad(&self, hash: TxHash, message: String) {
        debug!(tx_hash = %hex::encode(hash), %message, "marking transaction bad");
        if self.bad.send((hash, message)).is_err() {
            warn!(tx_hash = %hex::encode(hash), "mark-bad worker is gone");
        }
    }

    fn defer(&self, hash: TxHash) {
        if self.attempts.send(hash).is_err() {
            warn!(tx_hash = %hex::encode(hash), "attempt-count worker is gone");
        }
    }
}

impl TransactionAdmission {
    pub fn new(
        queue: Arc<dyn PendingTxQueue>,
        processor: Arc<dyn TransactionProcessor>,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            queue,
            processor,
            limits,
        }
    }

    /// Select the transactions for the next block.
    ///
    /// `now` is the generation time used for transaction time checks. Items
    /// that were not dequeued stay in the queue for the next attempt.
    pub async fn run(&self, deadline: &Deadline, now: DateTime<Utc>) -> Result<AdmissionReport> {
        self.processor.process_queue().await?;
        let snapshot = self.queue.len().await?;

        let (bad_tx, bad_rx) = mpsc::unbounded_channel();
        let (attempt_tx, attempt_rx) = mpsc::unbounded_channel();
        let bad_worker = tokio::spawn(mark_bad_worker(self.processor.clone(), bad_rx));
        let attempt_worker = tokio::spawn(attempt_worker(self.processor.clone(), attempt_rx));

        let effects = SideEffects {
            bad: bad_tx,
            attempts: attempt_tx,
        };
        let drained = self.drain(snapshot, deadline, now, &effects).await;

        // closing the senders ends both workers once they have caught up
        drop(effects);
        for (worker, handle) in [("mark_bad", bad_worker), ("attempt_count", attempt_worker)] {
            if let Err(e) = handle.await {
                warn!(worker, error = %e, "side-effect worker failed");
            }
        }

        if let Ok(report) = &drained {
            debug!(
                snapshot,
                dequeued = report.dequeued,
                admitted = report.transactions.len(),
                marked_bad = report.marked_bad,
                deferred = report.deferred,
                stop = ?report.stop,
                "admission finished"
            );
        }
        drained
    }

    async fn drain(
        &self,
        snapshot: usize,
        deadline: &Deadline,
        now: DateTime<Utc>,
        effects: &SideEffects,
    ) -> Result<AdmissionReport> {
        let mut limiter = ResourceLimiter::new(&self.limits);
        let mut report = AdmissionReport {
            transactions: Vec::new(),
            dequeued: 0,
            marked_bad: 0,
            deferred: 0,
            stop: DrainStop::QueueExhausted,
        };

        for _ in 0..snapshot {
            if deadline.is_fired() {
                report.stop = DrainStop::Deadline;
                break;
            }

            let Some(item) = self.queue.dequeue().await? else {
                break;
            };
            report.dequeued += 1;

            let tx = match self.processor.unmarshal(&item.value) {
                Ok(tx) => tx,
                Err(failure) => {
                    match failure.hash {
                        Some(hash) => {
                            effects.mark_bad(hash, failure.reason);
                            report.marked_bad += 1;
                        }
                        None => {
                            warn!(reason = %failure.reason, "dropping unreadable queue item");
                        }
                    }
                    continue;
                }
            };

            if let Err(reason) = self.processor.check(&tx, now.timestamp()) {
                effects.mark_bad(tx.hash, reason);
                report.marked_bad += 1;
                continue;
            }

            if tx.is_contract_call() {
                match limiter.check_limit(&tx) {
                    Ok(LimitVerdict::Ok) => {}
                    Ok(LimitVerdict::Skip) => {
                        effects.defer(tx.hash);
                        report.deferred += 1;
                        continue;
                    }
                    Ok(LimitVerdict::Stop) if report.transactions.is_empty() => {
                        effects.mark_bad(tx.hash, EXCEEDS_BLOCK_LIMITS.to_string());
                        report.marked_bad += 1;
                        continue;
                    }
                    Ok(LimitVerdict::Stop) => {
                        effects.defer(tx.hash);
                        report.deferred += 1;
                        report.stop = DrainStop::BlockFull;
                        break;
                    }
                    Err(e) => {
                        effects.mark_bad(tx.hash, e.to_string());
                        report.marked_bad += 1;
                        continue;
                    }
                }
            }

            report.transactions.push(item.value);
        }

        Ok(report)
    }
}

async fn mark_bad_worker(
    processor: Arc<dyn TransactionProcessor>,
    mut rx: UnboundedReceiver<(TxHash, String)>,
) {
    while let Some((hash, message)) = rx.recv().await {
        if let Err(e) = processor.mark_bad(hash, message).await {
            warn!(tx_hash = %hex::encode(hash), error = %e, "failed to mark transaction bad");
        }
    }
}

async fn attempt_worker(processor: Arc<dyn TransactionProcessor>, mut rx: UnboundedReceiver<TxHash>) {
    while let Some(hash) = rx.recv().await {
        if let Err(e) = processor.increment_attempt_count(hash).await {
            warn!(tx_hash = %hex::encode(hash), error = %e, "failed to increment attempt count");
        }
    }
}
