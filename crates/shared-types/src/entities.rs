//! # Core Domain Entities
//!
//! Chain entities shared by the block generator, the node runtime and the
//! storage/queue adapters.
//!
//! ## Clusters
//!
//! - **Chain**: `BlockHeader`, `Block`, `ChainHead`
//! - **Producers**: `ProducerNode`, `KeyId`
//! - **Transactions**: `TxHash`, `QueueItem`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CodecError;

// =============================================================================
// CLUSTER A: THE CHAIN
// =============================================================================

/// A 32-byte hash (SHA-256).
pub type Hash = [u8; 32];

/// Hash identifying a transaction envelope.
pub type TxHash = Hash;

/// Key identifier of a producer node (derived from its public key).
pub type KeyId = i64;

/// Sequential block identifier.
pub type BlockId = i64;

/// Block header version written by this node.
pub const BLOCK_VERSION: i32 = 1;

/// Type prefix of a serialized block envelope.
pub const BLOCK_TX_TYPE: u8 = 0;

/// The header of a block.
///
/// Exactly one header exists per `block_id`, and `block_id` is always the
/// previous head plus one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    /// Sequential block identifier.
    pub block_id: BlockId,
    /// Unix timestamp (seconds) at which the block was generated.
    pub time: i64,
    /// Ecosystem the block belongs to (0 for producer-generated blocks).
    pub ecosystem_id: i64,
    /// Key id of the producer.
    pub key_id: KeyId,
    /// Position of the producer in the ordered producer list.
    pub node_position: i64,
    /// Header format version.
    pub version: i32,
}

impl std::fmt::Display for BlockHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BlockID: {}, Time: {}, KeyID: {}, NodePosition: {}, Version: {}",
            self.block_id, self.time, self.key_id, self.node_position, self.version
        )
    }
}

/// A block: header plus the ordered raw transaction envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,
    /// Raw transaction envelopes in inclusion order.
    pub transactions: Vec<Vec<u8>>,
}

impl Block {
    /// Serialize as `[BLOCK_TX_TYPE] ++ bincode(header, transactions)`.
    pub fn marshal(&self) -> Result<Vec<u8>, CodecError> {
        let body = bincode::serialize(self).map_err(|e| CodecError::Encode(e.to_string()))?;
        let mut out = Vec::with_capacity(body.len() + 1);
        out.push(BLOCK_TX_TYPE);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Inverse of [`Block::marshal`].
    pub fn unmarshal(data: &[u8]) -> Result<Self, CodecError> {
        match data.split_first() {
            Some((&BLOCK_TX_TYPE, body)) => {
                bincode::deserialize(body).map_err(|e| CodecError::Decode(e.to_string()))
            }
            Some((other, _)) => Err(CodecError::UnexpectedType(*other)),
            None => Err(CodecError::Decode("empty block envelope".to_string())),
        }
    }
}

/// The current chain head as read from storage.
#[derive(Debug, Clone)]
pub struct ChainHead {
    /// Header of the last block.
    pub header: BlockHeader,
    /// Serialized block as stored.
    pub raw: Vec<u8>,
}

// =============================================================================
// CLUSTER B: PRODUCERS
// =============================================================================

/// A producer (full node) as recorded on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProducerNode {
    /// Key id of the node.
    pub key_id: KeyId,
    /// Address used for peer-to-peer block exchange.
    pub tcp_address: String,
    /// Address of the node's HTTP API.
    pub api_address: String,
    /// Node public key.
    pub public_key: Vec<u8>,
    /// Global unban time. The Unix epoch means "not globally banned".
    pub unban_time: DateTime<Utc>,
}

impl ProducerNode {
    /// Whether the chain records a global ban for this node.
    ///
    /// The recorded time is not compared with the clock: a non-epoch value
    /// stays a ban until a later transaction clears it.
    pub fn is_globally_banned(&self) -> bool {
        self.unban_time.timestamp() > 0
    }
}

// =============================================================================
// CLUSTER C: TRANSACTIONS
// =============================================================================

/// An item dequeued from the pending transaction queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// Raw transaction envelope.
    pub value: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        Block {
            header: BlockHeader {
                block_id: 11,
                time: 1_700_000_000,
                ecosystem_id: 0,
                key_id: 42,
                node_position: 1,
                version: BLOCK_VERSION,
            },
            transactions: vec![b"tx-a".to_vec(), b"tx-b".to_vec()],
        }
    }

    #[test]
    fn test_marshal_prefixes_block_type() {
        let bytes = sample_block().marshal().unwrap();
        assert_eq!(bytes[0], BLOCK_TX_TYPE);
        assert_eq!(Block::unmarshal(&bytes).unwrap(), sample_block());
    }

    #[test]
    fn test_unmarshal_rejects_foreign_type() {
        let mut bytes = sample_block().marshal().unwrap();
        bytes[0] = 7;
        assert!(matches!(
            Block::unmarshal(&bytes),
            Err(CodecError::UnexpectedType(7))
        ));
        assert!(Block::unmarshal(&[]).is_err());
    }

    #[test]
    fn test_global_ban_flag() {
        let mut node = ProducerNode::default();
        assert!(!node.is_globally_banned());

        node.unban_time = DateTime::from_timestamp(1_600_000_000, 0).unwrap();
        assert!(node.is_globally_banned());
    }
}
