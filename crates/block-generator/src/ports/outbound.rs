//! Outbound ports (driven side - SPI)

use crate::domain::{ContractCall, DecodeFailure, NodeKeys, ParsedTransaction, SignedInternalTx};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::{
    BlockHeader, BlockId, ChainHead, KeyId, ProducerNode, QueueItem, StorageError, TxHash,
};

/// Port: Chain storage
#[async_trait]
pub trait BlockLedger: Send + Sync {
    /// Current chain head, `None` before the first block is stored
    async fn last_block(&self) -> std::result::Result<Option<ChainHead>, StorageError>;

    /// Persist a serialized block.
    ///
    /// All-or-nothing: on error nothing of the block is visible.
    async fn insert_block(
        &self,
        block: Vec<u8>,
        verify: bool,
        broadcast: bool,
    ) -> std::result::Result<(), StorageError>;

    /// Whether a block by `node_position` with a time in `[from, to)` is stored
    async fn has_node_block_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        node_position: i64,
    ) -> std::result::Result<bool, StorageError>;
}

/// Port: Pending transaction queue (FIFO)
#[async_trait]
pub trait PendingTxQueue: Send + Sync {
    /// Number of queued items
    async fn len(&self) -> Result<usize>;

    /// Take the oldest item, `None` when empty
    async fn dequeue(&self) -> Result<Option<QueueItem>>;
}

/// Port: Transaction parsing, validation and bookkeeping
#[async_trait]
pub trait TransactionProcessor: Send + Sync {
    /// Pre-validation pass moving incoming transactions into the queue
    async fn process_queue(&self) -> Result<()>;

    /// Parse a raw envelope
    fn unmarshal(&self, raw: &[u8]) -> std::result::Result<ParsedTransaction, DecodeFailure>;

    /// Validate a parsed transaction against the clock (`now` in unix seconds)
    fn check(&self, tx: &ParsedTransaction, now: i64) -> std::result::Result<(), String>;

    /// Record a transaction as permanently invalid
    async fn mark_bad(&self, hash: TxHash, message: String) -> Result<()>;

    /// Bump the retry counter of a transaction left for a later block
    async fn increment_attempt_count(&self, hash: TxHash) -> Result<()>;
}

/// Port: This node's signing keys
pub trait KeyProvider: Send + Sync {
    /// Load the keys; fails when they are absent or the private key is empty
    fn node_keys(&self) -> Result<NodeKeys>;
}

/// Port: Ordered producer list as recorded on chain
pub trait ProducerRegistry: Send + Sync {
    /// Current snapshot of all producers, in position order
    fn nodes(&self) -> Vec<ProducerNode>;

    /// Position of `key_id` in the producer list
    fn node_position_by_key_id(&self, key_id: KeyId) -> Result<i64>;

    /// Producer serving `host`
    fn node_by_host(&self, host: &str) -> Result<ProducerNode>;
}

/// Port: Internal (node-signed) transaction submission
#[async_trait]
pub trait InternalTxGateway: Send + Sync {
    /// Sign a contract call with the node's private key
    fn new_internal_transaction(
        &self,
        call: &ContractCall,
        private_key: &[u8],
    ) -> Result<SignedInternalTx>;

    /// Queue a signed transaction for inclusion
    async fn create_transaction(&self, data: Vec<u8>, hash: TxHash, key_id: KeyId) -> Result<()>;
}

/// Port: Post-commit hook run after a block is persisted
#[async_trait]
pub trait CommitNotifier: Send + Sync {
    /// Called once per persisted block, off the producer's critical path
    async fn block_committed(&self, header: BlockHeader) -> Result<()>;
}

/// Port: Scheduled contracts due at a block
#[async_trait]
pub trait DelayedContractRunner: Send + Sync {
    /// Enqueue the delayed contracts due at `block_id`
    async fn run_for_block_id(&self, block_id: BlockId, keys: &NodeKeys) -> Result<()>;
}

/// Port: Wall clock
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Default clock using system time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
