//! Invariant checkers for produced blocks
//!
//! Every block handed to the ledger must pass these checks. They are cheap
//! and run under the chain lock right before serialization.

use crate::error::{GeneratorError, Result};
use shared_types::{BlockHeader, ChainHead};
use std::collections::HashSet;

/// Block id must extend the chain head by exactly one
pub fn check_sequential_id(head: &ChainHead, header: &BlockHeader) -> Result<()> {
    let expected = head.header.block_id + 1;
    if header.block_id != expected {
        return Err(GeneratorError::InvariantViolation(format!(
            "block id {} does not follow head {}",
            header.block_id, head.header.block_id
        )));
    }
    Ok(())
}

/// Empty blocks are never produced
pub fn check_non_empty(transactions: &[Vec<u8>]) -> Result<()> {
    if transactions.is_empty() {
        return Err(GeneratorError::InvariantViolation(
            "block has no transactions".to_string(),
        ));
    }
    Ok(())
}

/// No raw transaction appears more than once
pub fn check_no_duplicates(transactions: &[Vec<u8>]) -> Result<()> {
    use sha2::{Digest, Sha256};

    let mut seen = HashSet::new();

    for tx in transactions {
        let hash = Sha256::digest(tx);
        if !seen.insert(hash) {
            return Err(GeneratorError::InvariantViolation(format!(
                "duplicate transaction {}",
                hex::encode(hash)
            )));
        }
    }

    Ok(())
}

/// Block time must not go backwards relative to the head
pub fn check_timestamp(head: &ChainHead, header: &BlockHeader) -> Result<()> {
    if header.time < head.header.time {
        return Err(GeneratorError::InvariantViolation(format!(
            "block time {} is before head time {}",
            header.time, head.header.time
        )));
    }
    Ok(())
}

/// Validate a candidate block against the current head
pub fn validate_candidate(
    head: &ChainHead,
    header: &BlockHeader,
    transactions: &[Vec<u8>],
) -> Result<()> {
    check_sequential_id(head, header)?;
    check_timestamp(head, header)?;
    check_non_empty(transactions)?;
    check_no_duplicates(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::BLOCK_VERSION;

    fn header(block_id: i64, time: i64) -> BlockHeader {
        BlockHeader {
            block_id,
            time,
            ecosystem_id: 0,
            key_id: 1,
            node_position: 0,
            version: BLOCK_VERSION,
        }
    }

    fn head() -> ChainHead {
        ChainHead {
            header: header(10, 1_000),
            raw: vec![],
        }
    }

    #[test]
    fn test_valid_candidate() {
        let txs = vec![vec![1], vec![2]];
        assert!(validate_candidate(&head(), &header(11, 1_004), &txs).is_ok());
    }

    #[test]
    fn test_gap_in_ids_rejected() {
        assert!(check_sequential_id(&head(), &header(12, 1_004)).is_err());
        assert!(check_sequential_id(&head(), &header(10, 1_004)).is_err());
    }

    #[test]
    fn test_duplicates_rejected() {
        let txs = vec![vec![1, 2], vec![3], vec![1, 2]];
        assert!(matches!(
            check_no_duplicates(&txs),
            Err(GeneratorError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_empty_and_backwards_time_rejected() {
        assert!(check_non_empty(&[]).is_err());
        assert!(check_timestamp(&head(), &header(11, 999)).is_err());
    }
}
