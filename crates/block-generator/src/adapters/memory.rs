//! In-memory chain storage, pending queue and clock
//!
//! Used by the dev node and the tests. Production deployments plug a real
//! database behind the same ports.

use crate::error::Result;
use crate::ports::{BlockLedger, Clock, PendingTxQueue};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Mutex, RwLock};
use shared_types::{Block, BlockHeader, ChainHead, QueueItem, StorageError};
use std::collections::VecDeque;

/// In-memory block store.
///
/// Enforces the sequential-id rule on verified inserts; a rejected insert
/// leaves the store untouched.
#[derive(Default)]
pub struct InMemoryLedger {
    blocks: RwLock<Vec<(Block, Vec<u8>)>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a single transaction-less head block
    pub fn with_head(header: BlockHeader) -> std::result::Result<Self, StorageError> {
        let ledger = Self::new();
        let block = Block {
            header,
            transactions: vec![],
        };
        let raw = block.marshal()?;
        ledger.blocks.write().push((block, raw));
        Ok(ledger)
    }

    /// Copy of all stored blocks, oldest first
    pub fn blocks(&self) -> Vec<Block> {
        self.blocks.read().iter().map(|(b, _)| b.clone()).collect()
    }

    pub fn height(&self) -> usize {
        self.blocks.read().len()
    }
}

#[async_trait]
impl BlockLedger for InMemoryLedger {
    async fn last_block(&self) -> std::result::Result<Option<ChainHead>, StorageError> {
        Ok(self.blocks.read().last().map(|(block, raw)| ChainHead {
            header: block.header.clone(),
            raw: raw.clone(),
        }))
    }

    async fn insert_block(
        &self,
        block: Vec<u8>,
        verify: bool,
        _broadcast: bool,
    ) -> std::result::Result<(), StorageError> {
        let decoded = Block::unmarshal(&block)?;

        let mut blocks = self.blocks.write();
        if verify {
            if let Some((last, _)) = blocks.last() {
                let expected = last.header.block_id + 1;
                if decoded.header.block_id != expected {
                    return Err(StorageError::NonSequential {
                        expected,
                        actual: decoded.header.block_id,
                    });
                }
            }
        }
        blocks.push((decoded, block));
        Ok(())
    }

    async fn has_node_block_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        node_position: i64,
    ) -> std::result::Result<bool, StorageError> {
        let blocks = self.blocks.read();
        Ok(blocks.iter().rev().any(|(block, _)| {
            block.header.node_position == node_position
                && DateTime::from_timestamp(block.header.time, 0)
                    .is_some_and(|time| from <= time && time < to)
        }))
    }
}

/// FIFO pending transaction queue
#[derive(Default)]
pub struct InMemoryTxQueue {
    items: Mutex<VecDeque<QueueItem>>,
}

impl InMemoryTxQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw transaction
    pub fn push(&self, raw: Vec<u8>) {
        self.items.lock().push_back(QueueItem { value: raw });
    }

    /// Raw transactions still queued, oldest first
    pub fn snapshot(&self) -> Vec<Vec<u8>> {
        self.items.lock().iter().map(|i| i.value.clone()).collect()
    }
}

#[async_trait]
impl PendingTxQueue for InMemoryTxQueue {
    async fn len(&self) -> Result<usize> {
        Ok(self.items.lock().len())
    }

    async fn dequeue(&self) -> Result<Option<QueueItem>> {
        Ok(self.items.lock().pop_front())
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Clock set to `secs` after the Unix epoch
    pub fn at_unix(secs: i64) -> Self {
        Self::new(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
