//! Domain entities for block generation

use serde::{Deserialize, Serialize};
use shared_types::{BlockHeader, BlockId, KeyId, TxHash};

/// Ecosystem that hosts system contracts such as `NewBadBlock`
pub const SYSTEM_ECOSYSTEM_ID: i64 = 1;

/// Contract recording bad-block evidence on chain
pub const NEW_BAD_BLOCK_CONTRACT: &str = "NewBadBlock";

/// Parsed view of a raw transaction envelope
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedTransaction {
    /// Envelope hash
    pub hash: TxHash,

    /// Transaction type byte
    pub tx_type: u8,

    /// Unix timestamp (seconds) claimed by the sender
    pub time: i64,

    /// Sender key id
    pub key_id: KeyId,

    /// Ecosystem the transaction targets
    pub ecosystem_id: i64,

    /// Size of the full envelope in bytes
    pub size: usize,

    /// Contract invocation, if the transaction calls a smart contract
    pub contract: Option<ContractPayload>,
}

impl ParsedTransaction {
    /// Whether this transaction invokes a smart contract
    pub fn is_contract_call(&self) -> bool {
        self.contract.is_some()
    }
}

/// Smart contract invocation carried by a transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractPayload {
    /// Contract name
    pub contract: String,

    /// Encoded call parameters
    pub params: Vec<u8>,
}

/// Failure to parse a transaction envelope.
///
/// `hash` is present when the envelope was readable far enough to identify it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeFailure {
    /// Hash of the envelope, if known
    pub hash: Option<TxHash>,

    /// Reason reported by the parser
    pub reason: String,
}

/// This node's signing keys
#[derive(Clone, PartialEq, Eq)]
pub struct NodeKeys {
    /// Private key bytes
    pub private_key: Vec<u8>,

    /// Public key bytes
    pub public_key: Vec<u8>,
}

impl std::fmt::Debug for NodeKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeKeys")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key.len())
            .finish()
    }
}

/// Evidence that a producer published an invalid block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BadBlockEvidence {
    /// Producer of the bad block
    #[serde(rename = "ProducerNodeID")]
    pub producer_node_id: KeyId,

    /// Node that detected the bad block (us)
    #[serde(rename = "ConsumerNodeID")]
    pub consumer_node_id: KeyId,

    /// Id of the bad block
    #[serde(rename = "BlockID")]
    pub block_id: BlockId,

    /// Time of the bad block
    pub timestamp: i64,

    /// Why the block was rejected
    pub reason: String,
}

/// Internal contract call signed by this node
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractCall {
    /// Contract name
    pub contract: String,

    /// Unix timestamp (seconds) of the call
    pub time: i64,

    /// Ecosystem of the contract
    pub ecosystem_id: i64,

    /// Signer key id
    pub key_id: KeyId,

    /// Named call parameters
    pub params: serde_json::Value,
}

impl ContractCall {
    /// Build the `NewBadBlock` call for the given evidence
    pub fn new_bad_block(evidence: &BadBlockEvidence, key_id: KeyId, time: i64) -> Self {
        Self {
            contract: NEW_BAD_BLOCK_CONTRACT.to_string(),
            time,
            ecosystem_id: SYSTEM_ECOSYSTEM_ID,
            key_id,
            params: serde_json::to_value(evidence).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Signed internal transaction ready for submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedInternalTx {
    /// Envelope bytes
    pub data: Vec<u8>,

    /// Envelope hash
    pub hash: TxHash,
}

/// Why an attempt ended without a block
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// A block for our slot is already stored
    SlotAlreadyFilled,

    /// The current slot belongs to another producer
    NotOurSlot,

    /// Storage has no chain head yet
    NoChainHead,

    /// Nothing was admitted, and empty blocks are never produced
    NoTransactions,
}

/// Result of one generation attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Generation is paused on this node
    Paused,

    /// This node is not a validator
    NotEligible,

    /// Attempt ended without producing a block
    Skipped(SkipReason),

    /// A block was persisted
    Produced {
        /// Header of the new block
        header: BlockHeader,
        /// Number of transactions in it
        tx_count: usize,
    },
}

/// Why the admission drain stopped
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DrainStop {
    /// Every queued transaction was considered
    QueueExhausted,

    /// The slot deadline fired
    Deadline,

    /// A hard quota was reached
    BlockFull,
}

/// Summary of one admission run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmissionReport {
    /// Admitted raw transactions, in dequeue order
    pub transactions: Vec<Vec<u8>>,

    /// Items taken from the queue
    pub dequeued: usize,

    /// Items marked permanently bad
    pub marked_bad: usize,

    /// Items whose attempt count was incremented
    pub deferred: usize,

    /// Why the drain stopped
    pub stop: DrainStop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_block_call_params() {
        let evidence = BadBlockEvidence {
            producer_node_id: 11,
            consumer_node_id: 22,
            block_id: 100,
            timestamp: 1_700_000_000,
            reason: "invalid signature".into(),
        };
        let call = ContractCall::new_bad_block(&evidence, 22, 1_700_000_010);

        assert_eq!(call.contract, NEW_BAD_BLOCK_CONTRACT);
        assert_eq!(call.ecosystem_id, SYSTEM_ECOSYSTEM_ID);
        assert_eq!(call.params["ProducerNodeID"], 11);
        assert_eq!(call.params["ConsumerNodeID"], 22);
        assert_eq!(call.params["BlockID"], 100);
        assert_eq!(call.params["Reason"], "invalid signature");
    }

    #[test]
    fn test_node_keys_debug_hides_private_key() {
        let keys = NodeKeys {
            private_key: vec![9; 32],
            public_key: vec![1; 64],
        };
        let printed = format!("{:?}", keys);
        assert!(printed.contains("redacted"));
        assert!(!printed.contains("9, 9"));
    }
}
