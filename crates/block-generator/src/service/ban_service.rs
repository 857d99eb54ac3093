//! Producer ban service
//!
//! Two kinds of ban:
//!
//! - **local**: set by this node when it rejects a producer's block, ends
//!   after the configured cool-down;
//! - **global**: recorded on chain (non-epoch `unban_time` in the producer
//!   list), wins regardless of any local state.
//!
//! Registering a bad block also signs a `NewBadBlock` contract call with the
//! node key and submits it, so the network can decide on a global ban.

use crate::domain::{BadBlockEvidence, ContractCall, LocalBanTable};
use crate::error::{GeneratorError, Result};
use crate::ports::{Clock, InternalTxGateway, KeyProvider, NodeBanApi, ProducerRegistry};
use async_trait::async_trait;
use chrono::TimeDelta;
use parking_lot::Mutex;
use shared_types::{BlockId, KeyId, ProducerNode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Dependencies for NodeBanService
pub struct BanDependencies {
    pub registry: Arc<dyn ProducerRegistry>,
    pub keys: Arc<dyn KeyProvider>,
    pub gateway: Arc<dyn InternalTxGateway>,
    pub clock: Arc<dyn Clock>,
}

struct BanState {
    local: LocalBanTable,
    nodes: Vec<ProducerNode>,
}

/// Local and global producer bans
pub struct NodeBanService {
    key_id: KeyId,
    local_ban_time: TimeDelta,
    registry: Arc<dyn ProducerRegistry>,
    keys: Arc<dyn KeyProvider>,
    gateway: Arc<dyn InternalTxGateway>,
    clock: Arc<dyn Clock>,
    state: Mutex<BanState>,
}

impl NodeBanService {
    /// `key_id` is this node's key; `local_ban_time` the cool-down for local bans
    pub fn new(deps: BanDependencies, key_id: KeyId, local_ban_time: Duration) -> Self {
        let nodes = deps.registry.nodes();
        Self {
            key_id,
            local_ban_time: TimeDelta::from_std(local_ban_time).unwrap_or(TimeDelta::MAX),
            registry: deps.registry,
            keys: deps.keys,
            gateway: deps.gateway,
            clock: deps.clock,
            state: Mutex::new(BanState {
                local: LocalBanTable::new(),
                nodes,
            }),
        }
    }

    fn refresh_nodes(&self) {
        let nodes = self.registry.nodes();
        self.state.lock().nodes = nodes;
    }

    /// Returns `false` when another caller banned the node first
    fn local_ban(&self, node: &ProducerNode, block_id: BlockId, reason: &str) -> bool {
        let now = self.clock.now();
        let until = now.checked_add_signed(self.local_ban_time).unwrap_or(now);
        self.state
            .lock()
            .local
            .ban(node.key_id, until, block_id, reason, now)
    }

    async fn submit_evidence(
        &self,
        producer: &ProducerNode,
        block_id: BlockId,
        block_time: i64,
        reason: &str,
    ) -> Result<()> {
        let keys = self.keys.node_keys()?;
        if keys.private_key.is_empty() {
            error!("node private key is empty");
            return Err(GeneratorError::MissingKeys("node private key is empty".to_string()));
        }

        let consumer = self
            .state
            .lock()
            .nodes
            .iter()
            .find(|n| n.key_id == self.key_id)
            .map(|n| n.key_id)
            .ok_or_else(|| GeneratorError::NotAValidator {
                key_id: self.key_id,
                reason: "current node is not in the producer list".to_string(),
            })?;

        let evidence = BadBlockEvidence {
            producer_node_id: producer.key_id,
            consumer_node_id: consumer,
            block_id,
            timestamp: block_time,
            reason: reason.to_string(),
        };
        let call = ContractCall::new_bad_block(&evidence, self.key_id, self.clock.now().timestamp());
        let signed = self.gateway.new_internal_transaction(&call, &keys.private_key)?;
        self.gateway
            .create_transaction(signed.data, signed.hash, self.key_id)
            .await
    }
}

#[async_trait]
impl NodeBanApi for NodeBanService {
    async fn register_bad_block(
        &self,
        node: &ProducerNode,
        block_id: BlockId,
        block_time: i64,
        reason: &str,
    ) -> Result<()> {
        if self.is_banned(node) {
            debug!(producer = node.key_id, block_id, "producer already banned");
            return Ok(());
        }
        if !self.local_ban(node, block_id, reason) {
            return Ok(());
        }
        warn!(producer = node.key_id, block_id, %reason, "producer banned locally");

        self.submit_evidence(node, block_id, block_time, reason)
            .await
            .map_err(|e| GeneratorError::BanSubmission {
                producer: node.key_id,
                reason: e.to_string(),
            })
    }

    fn is_banned(&self, node: &ProducerNode) -> bool {
        self.refresh_nodes();

        let now = self.clock.now();
        let mut state = self.state.lock();
        if state.local.is_banned(node.key_id, now) {
            return true;
        }

        // a recorded unban time is not compared with the clock
        state
            .nodes
            .iter()
            .find(|n| n.key_id == node.key_id)
            .is_some_and(|n| n.is_globally_banned())
    }

    fn filter_banned_hosts(&self, hosts: &[String]) -> Result<Vec<String>> {
        let mut good_hosts = Vec::with_capacity(hosts.len());
        for host in hosts {
            let node = self.registry.node_by_host(host).map_err(|e| {
                error!(%host, error = %e, "getting node by host");
                match e {
                    GeneratorError::HostResolution { .. } => e,
                    other => GeneratorError::HostResolution {
                        host: host.clone(),
                        reason: other.to_string(),
                    },
                }
            })?;

            if !self.is_banned(&node) {
                good_hosts.push(node.tcp_address);
            }
        }
        Ok(good_hosts)
    }

    fn local_ban_count(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.local.prune_expired(now);
        state.local.len()
    }
}
