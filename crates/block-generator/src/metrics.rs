//! Metrics collection for block generation

use crate::domain::{AdmissionReport, DrainStop};
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for block generation
#[derive(Debug, Default)]
pub struct Metrics {
    /// Generation attempts (every tick that reached the producer)
    pub attempts: AtomicU64,

    /// Total blocks produced
    pub blocks_produced: AtomicU64,

    /// Total transactions admitted into produced blocks
    pub transactions_admitted: AtomicU64,

    /// Transactions marked permanently bad
    pub marked_bad: AtomicU64,

    /// Transactions deferred with an attempt-count increment
    pub deferred: AtomicU64,

    /// Admission runs cut short by the slot deadline
    pub deadline_hits: AtomicU64,

    /// Attempts that ended without a block
    pub skipped_slots: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of an attempt
    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the side effects of one admission run
    pub fn record_admission(&self, report: &AdmissionReport) {
        self.marked_bad
            .fetch_add(report.marked_bad as u64, Ordering::Relaxed);
        self.deferred
            .fetch_add(report.deferred as u64, Ordering::Relaxed);
        if report.stop == DrainStop::Deadline {
            self.deadline_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a produced block
    pub fn record_block_produced(&self, tx_count: usize) {
        self.blocks_produced.fetch_add(1, Ordering::Relaxed);
        self.transactions_admitted
            .fetch_add(tx_count as u64, Ordering::Relaxed);
    }

    /// Record an attempt that produced nothing
    pub fn record_skip(&self) {
        self.skipped_slots.fetch_add(1, Ordering::Relaxed);
    }

    /// Get blocks produced
    pub fn get_blocks_produced(&self) -> u64 {
        self.blocks_produced.load(Ordering::Relaxed)
    }

    /// Get average transactions per block
    pub fn get_avg_transactions_per_block(&self) -> f64 {
        let blocks = self.blocks_produced.load(Ordering::Relaxed);
        if blocks == 0 {
            return 0.0;
        }
        let txs = self.transactions_admitted.load(Ordering::Relaxed);
        txs as f64 / blocks as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(marked_bad: usize, deferred: usize, stop: DrainStop) -> AdmissionReport {
        AdmissionReport {
            transactions: vec![],
            dequeued: marked_bad + deferred,
            marked_bad,
            deferred,
            stop,
        }
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = Metrics::new();

        metrics.record_block_produced(100);
        metrics.record_block_produced(150);

        assert_eq!(metrics.get_blocks_produced(), 2);
        assert_eq!(metrics.get_avg_transactions_per_block(), 125.0);
    }

    #[test]
    fn test_admission_recording() {
        let metrics = Metrics::new();

        metrics.record_admission(&report(2, 1, DrainStop::Deadline));
        metrics.record_admission(&report(0, 3, DrainStop::BlockFull));

        assert_eq!(metrics.marked_bad.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.deferred.load(Ordering::Relaxed), 4);
        assert_eq!(metrics.deadline_hits.load(Ordering::Relaxed), 1);
    }
}
