//! Per-block resource quotas
//!
//! A [`ResourceLimiter`] lives for exactly one generation attempt. Each
//! contract transaction is offered to every limiter; the running totals are
//! only committed once all of them answer [`LimitVerdict::Ok`], so a skipped
//! or stopped transaction never consumes quota.
//!
//! | Limiter                | Exceeded ⇒             |
//! |------------------------|------------------------|
//! | max tx count           | `Stop` (block is full) |
//! | max block size         | `Stop`                 |
//! | max single tx size     | `LimitError` (bad tx)  |
//! | per sender key         | `Skip` (try later)     |
//! | per ecosystem + sender | `Skip`                 |

use super::entities::ParsedTransaction;
use crate::config::LimitsConfig;
use shared_types::KeyId;
use std::collections::HashMap;
use thiserror::Error;

/// Outcome of a quota check
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LimitVerdict {
    /// Within quota; counters were updated
    Ok,

    /// Leave this transaction for a later block, keep scanning
    Skip,

    /// The block is full; stop admitting
    Stop,
}

/// A transaction that can never fit any block
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{limiter}: {message}")]
pub struct LimitError {
    /// Limiter that rejected the transaction
    pub limiter: &'static str,
    /// Human-readable reason, recorded as the bad-transaction message
    pub message: String,
}

/// A single quota dimension
pub trait Limiter: Send {
    /// Name used in logs and error messages
    fn name(&self) -> &'static str;

    /// Check `tx` against the current totals without changing them
    fn check(&self, tx: &ParsedTransaction) -> Result<LimitVerdict, LimitError>;

    /// Account for an admitted transaction
    fn commit(&mut self, tx: &ParsedTransaction);
}

struct TxCountLimiter {
    limit: usize,
    count: usize,
}

impl Limiter for TxCountLimiter {
    fn name(&self) -> &'static str {
        "txMaxLimit"
    }

    fn check(&self, _tx: &ParsedTransaction) -> Result<LimitVerdict, LimitError> {
        if self.count + 1 > self.limit {
            return Ok(LimitVerdict::Stop);
        }
        Ok(LimitVerdict::Ok)
    }

    fn commit(&mut self, _tx: &ParsedTransaction) {
        self.count += 1;
    }
}

struct BlockSizeLimiter {
    block_limit: u64,
    tx_limit: u64,
    size: u64,
}

impl Limiter for BlockSizeLimiter {
    fn name(&self) -> &'static str {
        "txMaxSize"
    }

    fn check(&self, tx: &ParsedTransaction) -> Result<LimitVerdict, LimitError> {
        let tx_size = tx.size as u64;
        if self.tx_limit > 0 && tx_size > self.tx_limit {
            return Err(LimitError {
                limiter: self.name(),
                message: format!("Max size of tx exceeded: {} > {}", tx_size, self.tx_limit),
            });
        }
        if self.block_limit > 0 && self.size + tx_size > self.block_limit {
            return Ok(LimitVerdict::Stop);
        }
        Ok(LimitVerdict::Ok)
    }

    fn commit(&mut self, tx: &ParsedTransaction) {
        self.size += tx.size as u64;
    }
}

struct PerKeyLimiter {
    limit: usize,
    counts: HashMap<KeyId, usize>,
}

impl Limiter for PerKeyLimiter {
    fn name(&self) -> &'static str {
        "txUserLimit"
    }

    fn check(&self, tx: &ParsedTransaction) -> Result<LimitVerdict, LimitError> {
        let used = self.counts.get(&tx.key_id).copied().unwrap_or(0);
        if used + 1 > self.limit {
            return Ok(LimitVerdict::Skip);
        }
        Ok(LimitVerdict::Ok)
    }

    fn commit(&mut self, tx: &ParsedTransaction) {
        *self.counts.entry(tx.key_id).or_default() += 1;
    }
}

struct PerEcosystemKeyLimiter {
    limit: usize,
    counts: HashMap<(i64, KeyId), usize>,
}

impl Limiter for PerEcosystemKeyLimiter {
    fn name(&self) -> &'static str {
        "txUserEcosysLimit"
    }

    fn check(&self, tx: &ParsedTransaction) -> Result<LimitVerdict, LimitError> {
        let used = self
            .counts
            .get(&(tx.ecosystem_id, tx.key_id))
            .copied()
            .unwrap_or(0);
        if used + 1 > self.limit {
            return Ok(LimitVerdict::Skip);
        }
        Ok(LimitVerdict::Ok)
    }

    fn commit(&mut self, tx: &ParsedTransaction) {
        *self
            .counts
            .entry((tx.ecosystem_id, tx.key_id))
            .or_default() += 1;
    }
}

/// Quota accounting for one in-progress block
pub struct ResourceLimiter {
    limiters: Vec<Box<dyn Limiter>>,
}

impl ResourceLimiter {
    /// Build the limiter set from configuration. Zero values are left out.
    pub fn new(config: &LimitsConfig) -> Self {
        let mut limiters: Vec<Box<dyn Limiter>> = Vec::with_capacity(4);
        if config.max_tx_count > 0 {
            limiters.push(Box::new(TxCountLimiter {
                limit: config.max_tx_count,
                count: 0,
            }));
        }
        if config.max_block_size > 0 || config.max_tx_size > 0 {
            limiters.push(Box::new(BlockSizeLimiter {
                block_limit: config.max_block_size,
                tx_limit: config.max_tx_size,
                size: 0,
            }));
        }
        if config.max_tx_per_key > 0 {
            limiters.push(Box::new(PerKeyLimiter {
                limit: config.max_tx_per_key,
                counts: HashMap::new(),
            }));
        }
        if config.max_tx_per_ecosystem_key > 0 {
            limiters.push(Box::new(PerEcosystemKeyLimiter {
                limit: config.max_tx_per_ecosystem_key,
                counts: HashMap::new(),
            }));
        }
        Self { limiters }
    }

    /// Check `tx` against every quota.
    ///
    /// The first non-`Ok` answer wins, in limiter order. Counters move only
    /// when the transaction is accepted.
    pub fn check_limit(&mut self, tx: &ParsedTransaction) -> Result<LimitVerdict, LimitError> {
        for limiter in &self.limiters {
            match limiter.check(tx)? {
                LimitVerdict::Ok => {}
                verdict => {
                    tracing::debug!(
                        limiter = limiter.name(),
                        ?verdict,
                        tx_hash = %hex::encode(tx.hash),
                        "transaction hit block limit"
                    );
                    return Ok(verdict);
                }
            }
        }
        for limiter in &mut self.limiters {
            limiter.commit(tx);
        }
        Ok(LimitVerdict::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ContractPayload;

    fn tx(key_id: KeyId, ecosystem_id: i64, size: usize) -> ParsedTransaction {
        ParsedTransaction {
            hash: [key_id as u8; 32],
            tx_type: 1,
            time: 0,
            key_id,
            ecosystem_id,
            size,
            contract: Some(ContractPayload {
                contract: "Transfer".into(),
                params: vec![],
            }),
        }
    }

    fn limits() -> LimitsConfig {
        LimitsConfig {
            max_tx_count: 0,
            max_block_size: 0,
            max_tx_size: 0,
            max_tx_per_key: 0,
            max_tx_per_ecosystem_key: 0,
        }
    }

    #[test]
    fn test_count_limit_stops() {
        let mut limiter = ResourceLimiter::new(&LimitsConfig {
            max_tx_count: 2,
            ..limits()
        });
        assert_eq!(limiter.check_limit(&tx(1, 1, 10)), Ok(LimitVerdict::Ok));
        assert_eq!(limiter.check_limit(&tx(2, 1, 10)), Ok(LimitVerdict::Ok));
        assert_eq!(limiter.check_limit(&tx(3, 1, 10)), Ok(LimitVerdict::Stop));
    }

    #[test]
    fn test_block_size_stops_and_tx_size_rejects() {
        let mut limiter = ResourceLimiter::new(&LimitsConfig {
            max_block_size: 100,
            max_tx_size: 80,
            ..limits()
        });
        assert_eq!(limiter.check_limit(&tx(1, 1, 60)), Ok(LimitVerdict::Ok));
        assert_eq!(limiter.check_limit(&tx(2, 1, 50)), Ok(LimitVerdict::Stop));

        let err = limiter.check_limit(&tx(3, 1, 81)).unwrap_err();
        assert_eq!(err.limiter, "txMaxSize");
    }

    #[test]
    fn test_per_key_limit_skips_only_that_key() {
        let mut limiter = ResourceLimiter::new(&LimitsConfig {
            max_tx_per_key: 1,
            ..limits()
        });
        assert_eq!(limiter.check_limit(&tx(1, 1, 10)), Ok(LimitVerdict::Ok));
        assert_eq!(limiter.check_limit(&tx(1, 1, 10)), Ok(LimitVerdict::Skip));
        assert_eq!(limiter.check_limit(&tx(2, 1, 10)), Ok(LimitVerdict::Ok));
    }

    #[test]
    fn test_per_ecosystem_key_limit() {
        let mut limiter = ResourceLimiter::new(&LimitsConfig {
            max_tx_per_ecosystem_key: 1,
            ..limits()
        });
        assert_eq!(limiter.check_limit(&tx(1, 1, 10)), Ok(LimitVerdict::Ok));
        assert_eq!(limiter.check_limit(&tx(1, 2, 10)), Ok(LimitVerdict::Ok));
        assert_eq!(limiter.check_limit(&tx(1, 1, 10)), Ok(LimitVerdict::Skip));
    }

    #[test]
    fn test_rejected_tx_does_not_consume_quota() {
        let mut limiter = ResourceLimiter::new(&LimitsConfig {
            max_tx_count: 2,
            max_tx_per_key: 1,
            ..limits()
        });
        assert_eq!(limiter.check_limit(&tx(1, 1, 10)), Ok(LimitVerdict::Ok));
        // skipped by the per-key limiter: must not count towards the block total
        assert_eq!(limiter.check_limit(&tx(1, 1, 10)), Ok(LimitVerdict::Skip));
        assert_eq!(limiter.check_limit(&tx(2, 1, 10)), Ok(LimitVerdict::Ok));
        assert_eq!(limiter.check_limit(&tx(3, 1, 10)), Ok(LimitVerdict::Stop));
    }

    #[test]
    fn test_zero_limits_disable_everything() {
        let mut limiter = ResourceLimiter::new(&limits());
        for i in 0..1_000 {
            assert_eq!(
                limiter.check_limit(&tx(1, 1, 1 << 20)),
                Ok(LimitVerdict::Ok),
                "tx {}",
                i
            );
        }
    }
}
