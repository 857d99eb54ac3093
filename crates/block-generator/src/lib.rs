//! # Block Generator
//!
//! Node-local block generation for a permissioned chain with a fixed,
//! ordered set of producer nodes.
//!
//! ## Purpose
//!
//! - Decide whether this node owns the current time slot (round robin)
//! - Drain the pending queue into a block within the slot deadline
//! - Enforce per-block quotas (count, size, per sender)
//! - Ban producers of bad blocks locally and report them on chain
//!
//! ## Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Adapters (Outer)                                   │
//! │  - In-memory ledger, queue, registry, keys          │
//! │  - Dev transaction codec                            │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Service                                            │
//! │  - BlockProducer, TransactionAdmission              │
//! │  - NodeBanService, BlockGeneratorDaemon             │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Ports (Middle)                                     │
//! │  - Inbound: BlockProducerApi, NodeBanApi            │
//! │  - Outbound: BlockLedger, PendingTxQueue, ...       │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Domain (Inner - Pure Logic)                        │
//! │  - LeaderSchedule, ResourceLimiter                  │
//! │  - LocalBanTable, invariants                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Block Invariants
//!
//! 1. **Sequential ids**: a new block is always head + 1
//! 2. **One writer**: head read to persist runs under the [`ChainLock`]
//! 3. **No empty blocks**: an attempt that admits nothing produces nothing
//! 4. **FIFO**: admitted transactions keep their queue order
//! 5. **All or nothing**: a failed persist leaves no partial block
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! let producer = Arc::new(BlockProducer::new(ProducerDependencies { .. }));
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let handle = BlockGeneratorDaemon::new(producer, config).spawn(shutdown_rx);
//! ```

#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

pub use config::{BlockGeneratorConfig, LimitsConfig, ScheduleConfig};
pub use domain::{
    AdmissionReport, DrainStop, GenerationOutcome, LeaderSchedule, LimitVerdict, ResourceLimiter,
    SkipReason,
};
pub use error::{GeneratorError, Result};
pub use metrics::Metrics;
pub use ports::*;
pub use service::{
    BanDependencies, BlockGeneratorDaemon, BlockProducer, ChainLock, Deadline, NodeBanService,
    ProducerDependencies, TransactionAdmission,
};
