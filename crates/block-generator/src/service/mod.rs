//! Block generation services
//!
//! - [`BlockProducer`]: one generation attempt per tick
//! - [`TransactionAdmission`]: deadline-bounded queue drain
//! - [`NodeBanService`]: local and global producer bans
//! - [`BlockGeneratorDaemon`]: the tick loop
//! - [`ChainLock`]: exclusive access to the chain head

mod admission;
mod ban_service;
mod chain_lock;
mod daemon;
mod deadline;
mod producer;

pub use admission::{TransactionAdmission, EXCEEDS_BLOCK_LIMITS};
pub use ban_service::{BanDependencies, NodeBanService};
pub use chain_lock::{ChainLock, ChainLockGuard};
pub use daemon::BlockGeneratorDaemon;
pub use deadline::Deadline;
pub use producer::{BlockProducer, ProducerDependencies};
