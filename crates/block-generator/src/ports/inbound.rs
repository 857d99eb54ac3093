//! Inbound ports (driving side - API)

use crate::domain::GenerationOutcome;
use crate::error::Result;
use async_trait::async_trait;
use shared_types::{BlockId, ProducerNode};

/// Primary port: Block production
#[async_trait]
pub trait BlockProducerApi: Send + Sync {
    /// Run one generation attempt for the current slot
    async fn try_generate(&self) -> Result<GenerationOutcome>;

    /// Stop producing until [`resume`](Self::resume) is called
    fn pause(&self);

    /// Resume production
    fn resume(&self);

    /// Whether production is paused
    fn is_paused(&self) -> bool;
}

/// Primary port: Producer banning
#[async_trait]
pub trait NodeBanApi: Send + Sync {
    /// Ban `node` locally and submit evidence of its bad block.
    ///
    /// No-op when the node is already banned.
    async fn register_bad_block(
        &self,
        node: &ProducerNode,
        block_id: BlockId,
        block_time: i64,
        reason: &str,
    ) -> Result<()>;

    /// Whether `node` is banned locally or globally
    fn is_banned(&self, node: &ProducerNode) -> bool;

    /// TCP addresses of the unbanned producers behind `hosts`, in input order
    fn filter_banned_hosts(&self, hosts: &[String]) -> Result<Vec<String>>;

    /// Number of local bans still in force
    fn local_ban_count(&self) -> usize;
}
