//! Adapters implementing the outbound ports in memory
//!
//! The dev node and the tests run entirely on these.

pub mod dev_tx;
pub mod memory;
pub mod node;

pub use dev_tx::{envelope_hash, DevTransaction, DevTransactionProcessor};
pub use memory::{InMemoryLedger, InMemoryTxQueue, ManualClock};
pub use node::{
    LoggingCommitNotifier, QueuedDelayedContracts, RecordingTxGateway, StaticKeyProvider,
    StaticRegistry, SubmittedTx,
};
