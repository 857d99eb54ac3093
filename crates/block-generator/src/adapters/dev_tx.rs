//! Development transaction format and processor
//!
//! Envelope: `[DEV_TX_TYPE] ++ bincode(DevTransaction)`, hashed with
//! SHA-256 over the whole envelope. Good enough to drive the producer end to
//! end without a contract VM.

use crate::domain::{ContractPayload, DecodeFailure, ParsedTransaction};
use crate::error::{GeneratorError, Result};
use crate::ports::TransactionProcessor;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared_types::{KeyId, TxHash};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Type prefix of a development transaction envelope
pub const DEV_TX_TYPE: u8 = 1;

/// Transactions may be at most this many seconds ahead of the generator clock
pub const MAX_TX_FORWARD_SECS: i64 = 600;

/// Transactions older than this many seconds are rejected
pub const MAX_TX_BACK_SECS: i64 = 86_400;

/// Body of a development transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevTransaction {
    pub key_id: KeyId,
    pub ecosystem_id: i64,
    /// Unix seconds
    pub time: i64,
    /// Distinguishes otherwise identical transactions
    pub nonce: u64,
    pub contract: Option<ContractPayload>,
}

impl DevTransaction {
    /// Contract call from `key_id` with a payload of `payload_len` bytes
    pub fn contract_call(
        key_id: KeyId,
        ecosystem_id: i64,
        time: i64,
        nonce: u64,
        payload_len: usize,
    ) -> Self {
        Self {
            key_id,
            ecosystem_id,
            time,
            nonce,
            contract: Some(ContractPayload {
                contract: "Transfer".to_string(),
                params: vec![0; payload_len],
            }),
        }
    }

    /// Plain (non-contract) transaction
    pub fn plain(key_id: KeyId, time: i64, nonce: u64) -> Self {
        Self {
            key_id,
            ecosystem_id: 1,
            time,
            nonce,
            contract: None,
        }
    }

    /// Serialize into an envelope
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body =
            bincode::serialize(self).map_err(|e| GeneratorError::Serialization(e.to_string()))?;
        let mut out = Vec::with_capacity(body.len() + 1);
        out.push(DEV_TX_TYPE);
        out.extend_from_slice(&body);
        Ok(out)
    }
}

/// SHA-256 of an envelope
pub fn envelope_hash(raw: &[u8]) -> TxHash {
    Sha256::digest(raw).into()
}

/// Processor for [`DevTransaction`] envelopes.
///
/// Records every bad mark and attempt-count bump so callers can inspect them.
#[derive(Default)]
pub struct DevTransactionProcessor {
    bad: Mutex<Vec<(TxHash, String)>>,
    attempts: Mutex<HashMap<TxHash, u32>>,
    process_calls: AtomicUsize,
    fail_process: AtomicBool,
}

impl DevTransactionProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next pre-validation passes fail (or succeed again)
    pub fn set_fail_process(&self, fail: bool) {
        self.fail_process.store(fail, Ordering::SeqCst);
    }

    /// Transactions marked bad, in the order recorded
    pub fn bad_transactions(&self) -> Vec<(TxHash, String)> {
        self.bad.lock().clone()
    }

    /// Attempt count recorded for `hash`
    pub fn attempts(&self, hash: &TxHash) -> u32 {
        self.attempts.lock().get(hash).copied().unwrap_or(0)
    }

    pub fn process_calls(&self) -> usize {
        self.process_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionProcessor for DevTransactionProcessor {
    async fn process_queue(&self) -> Result<()> {
        self.process_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_process.load(Ordering::SeqCst) {
            return Err(GeneratorError::Processing(
                "pre-validation pass failed".to_string(),
            ));
        }
        Ok(())
    }

    fn unmarshal(&self, raw: &[u8]) -> std::result::Result<ParsedTransaction, DecodeFailure> {
        let Some((&tx_type, body)) = raw.split_first() else {
            return Err(DecodeFailure {
                hash: None,
                reason: "empty transaction".to_string(),
            });
        };
        let hash = envelope_hash(raw);
        if tx_type != DEV_TX_TYPE {
            return Err(DecodeFailure {
                hash: Some(hash),
                reason: format!("unknown transaction type {}", tx_type),
            });
        }
        let tx: DevTransaction = bincode::deserialize(body).map_err(|e| DecodeFailure {
            hash: Some(hash),
            reason: e.to_string(),
        })?;

        Ok(ParsedTransaction {
            hash,
            tx_type,
            time: tx.time,
            key_id: tx.key_id,
            ecosystem_id: tx.ecosystem_id,
            size: raw.len(),
            contract: tx.contract,
        })
    }

    fn check(&self, tx: &ParsedTransaction, now: i64) -> std::result::Result<(), String> {
        if tx.time > now + MAX_TX_FORWARD_SECS {
            return Err(format!(
                "transaction time {} is too far in the future (now {})",
                tx.time, now
            ));
        }
        if tx.time < now - MAX_TX_BACK_SECS {
            return Err(format!("transaction time {} is too old (now {})", tx.time, now));
        }
        Ok(())
    }

    async fn mark_bad(&self, hash: TxHash, message: String) -> Result<()> {
        self.bad.lock().push((hash, message));
        Ok(())
    }

    async fn increment_attempt_count(&self, hash: TxHash) -> Result<()> {
        *self.attempts.lock().entry(hash).or_default() += 1;
        Ok(())
    }
}
