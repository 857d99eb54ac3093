//! Static producer registry, key store, internal transaction gateway and
//! the post-commit / delayed-contract hooks used by the dev node.

use super::memory::InMemoryTxQueue;
use crate::domain::{ContractCall, NodeKeys, SignedInternalTx};
use crate::error::{GeneratorError, Result};
use crate::ports::{
    CommitNotifier, DelayedContractRunner, InternalTxGateway, KeyProvider, ProducerRegistry,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use shared_types::{BlockHeader, BlockId, KeyId, ProducerNode, TxHash};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Producer list held in memory, in position order
#[derive(Default)]
pub struct StaticRegistry {
    nodes: RwLock<Vec<ProducerNode>>,
}

impl StaticRegistry {
    pub fn new(nodes: Vec<ProducerNode>) -> Self {
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    /// Replace the producer list
    pub fn set_nodes(&self, nodes: Vec<ProducerNode>) {
        *self.nodes.write() = nodes;
    }

    /// Record a global ban for `key_id`
    pub fn ban_globally(&self, key_id: KeyId, unban_time: DateTime<Utc>) {
        for node in self.nodes.write().iter_mut() {
            if node.key_id == key_id {
                node.unban_time = unban_time;
            }
        }
    }
}

impl ProducerRegistry for StaticRegistry {
    fn nodes(&self) -> Vec<ProducerNode> {
        self.nodes.read().clone()
    }

    fn node_position_by_key_id(&self, key_id: KeyId) -> Result<i64> {
        self.nodes
            .read()
            .iter()
            .position(|n| n.key_id == key_id)
            .map(|p| p as i64)
            .ok_or_else(|| GeneratorError::NotAValidator {
                key_id,
                reason: "key id not found in producer list".to_string(),
            })
    }

    fn node_by_host(&self, host: &str) -> Result<ProducerNode> {
        self.nodes
            .read()
            .iter()
            .find(|n| n.tcp_address == host || n.api_address == host)
            .cloned()
            .ok_or_else(|| GeneratorError::HostResolution {
                host: host.to_string(),
                reason: "no producer serves this host".to_string(),
            })
    }
}

/// Keys fixed at startup
pub struct StaticKeyProvider {
    keys: Option<NodeKeys>,
}

impl StaticKeyProvider {
    pub fn new(keys: NodeKeys) -> Self {
        Self { keys: Some(keys) }
    }

    /// Provider with no keys configured
    pub fn missing() -> Self {
        Self { keys: None }
    }
}

impl KeyProvider for StaticKeyProvider {
    fn node_keys(&self) -> Result<NodeKeys> {
        match &self.keys {
            Some(keys) if !keys.private_key.is_empty() => Ok(keys.clone()),
            Some(_) => Err(GeneratorError::MissingKeys(
                "node private key is empty".to_string(),
            )),
            None => Err(GeneratorError::MissingKeys(
                "node keys are not configured".to_string(),
            )),
        }
    }
}

/// A transaction accepted by [`RecordingTxGateway::create_transaction`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmittedTx {
    pub data: Vec<u8>,
    pub hash: TxHash,
    pub key_id: KeyId,
}

/// Gateway that signs with SHA-256 and keeps submitted transactions in memory
#[derive(Default)]
pub struct RecordingTxGateway {
    submitted: Mutex<Vec<SubmittedTx>>,
    reject: AtomicBool,
}

impl RecordingTxGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following submission
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn submitted(&self) -> Vec<SubmittedTx> {
        self.submitted.lock().clone()
    }

    /// Decode the contract call of a submitted transaction
    pub fn decode_call(tx: &SubmittedTx) -> Result<ContractCall> {
        let body = tx.data.get(32..).unwrap_or_default();
        serde_json::from_slice(body).map_err(|e| GeneratorError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl InternalTxGateway for RecordingTxGateway {
    fn new_internal_transaction(
        &self,
        call: &ContractCall,
        private_key: &[u8],
    ) -> Result<SignedInternalTx> {
        if private_key.is_empty() {
            return Err(GeneratorError::MissingKeys(
                "cannot sign with an empty key".to_string(),
            ));
        }
        let body =
            serde_json::to_vec(call).map_err(|e| GeneratorError::Serialization(e.to_string()))?;

        let mut signer = Sha256::new();
        signer.update(private_key);
        signer.update(&body);
        let signature = signer.finalize();

        let mut data = Vec::with_capacity(signature.len() + body.len());
        data.extend_from_slice(&signature);
        data.extend_from_slice(&body);
        let hash = Sha256::digest(&data).into();
        Ok(SignedInternalTx { data, hash })
    }

    async fn create_transaction(&self, data: Vec<u8>, hash: TxHash, key_id: KeyId) -> Result<()> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(GeneratorError::Queue("transaction rejected".to_string()));
        }
        self.submitted.lock().push(SubmittedTx { data, hash, key_id });
        Ok(())
    }
}

/// Post-commit hook that logs each committed block
#[derive(Default)]
pub struct LoggingCommitNotifier {
    committed: AtomicU64,
}

impl LoggingCommitNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommitNotifier for LoggingCommitNotifier {
    async fn block_committed(&self, header: BlockHeader) -> Result<()> {
        self.committed.fetch_add(1, Ordering::SeqCst);
        info!(
            block_id = header.block_id,
            key_id = header.key_id,
            "checking token movement limits"
        );
        Ok(())
    }
}

/// Contracts scheduled to run at a given block, delivered through the queue
pub struct QueuedDelayedContracts {
    queue: Arc<InMemoryTxQueue>,
    scheduled: Mutex<BTreeMap<BlockId, Vec<Vec<u8>>>>,
}

impl QueuedDelayedContracts {
    pub fn new(queue: Arc<InMemoryTxQueue>) -> Self {
        Self {
            queue,
            scheduled: Mutex::new(BTreeMap::new()),
        }
    }

    /// Schedule `raw` to be queued when block `block_id` is generated
    pub fn schedule(&self, block_id: BlockId, raw: Vec<u8>) {
        self.scheduled.lock().entry(block_id).or_default().push(raw);
    }

    /// Number of transactions still waiting for their block
    pub fn pending(&self) -> usize {
        self.scheduled.lock().values().map(Vec::len).sum()
    }
}

#[async_trait]
impl DelayedContractRunner for QueuedDelayedContracts {
    async fn run_for_block_id(&self, block_id: BlockId, _keys: &NodeKeys) -> Result<()> {
        // anything scheduled for an earlier block that was never generated is due too
        let due: Vec<Vec<u8>> = {
            let mut scheduled = self.scheduled.lock();
            let later = scheduled.split_off(&(block_id + 1));
            std::mem::replace(&mut *scheduled, later)
                .into_values()
                .flatten()
                .collect()
        };
        for raw in due {
            self.queue.push(raw);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(key_id: KeyId, host: &str) -> ProducerNode {
        ProducerNode {
            key_id,
            tcp_address: host.to_string(),
            api_address: format!("http://{}", host),
            ..Default::default()
        }
    }

    #[test]
    fn test_registry_lookups() {
        let registry = StaticRegistry::new(vec![node(10, "a:1"), node(20, "b:1")]);

        assert_eq!(registry.node_position_by_key_id(20).unwrap(), 1);
        assert!(matches!(
            registry.node_position_by_key_id(30),
            Err(GeneratorError::NotAValidator { key_id: 30, .. })
        ));
        assert_eq!(registry.node_by_host("http://a:1").unwrap().key_id, 10);
        assert!(registry.node_by_host("c:1").is_err());
    }

    #[test]
    fn test_missing_keys() {
        assert!(StaticKeyProvider::missing().node_keys().is_err());
        let empty = StaticKeyProvider::new(NodeKeys {
            private_key: vec![],
            public_key: vec![1],
        });
        assert!(matches!(empty.node_keys(), Err(GeneratorError::MissingKeys(_))));
    }

    #[tokio::test]
    async fn test_signed_call_round_trips_through_gateway() {
        let gateway = RecordingTxGateway::new();
        let call = ContractCall {
            contract: "NewBadBlock".to_string(),
            time: 1,
            ecosystem_id: 1,
            key_id: 5,
            params: serde_json::json!({ "BlockID": 3 }),
        };
        let signed = gateway.new_internal_transaction(&call, &[7; 32]).unwrap();
        gateway
            .create_transaction(signed.data, signed.hash, 5)
            .await
            .unwrap();

        let submitted = gateway.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(RecordingTxGateway::decode_call(&submitted[0]).unwrap(), call);
    }

    #[tokio::test]
    async fn test_delayed_contracts_are_queued_once() {
        let queue = Arc::new(InMemoryTxQueue::new());
        let delayed = QueuedDelayedContracts::new(queue.clone());
        let keys = NodeKeys {
            private_key: vec![1],
            public_key: vec![2],
        };
        delayed.schedule(11, vec![1]);
        delayed.schedule(12, vec![2]);

        delayed.run_for_block_id(11, &keys).await.unwrap();
        delayed.run_for_block_id(11, &keys).await.unwrap();

        assert_eq!(queue.snapshot(), vec![vec![1]]);
        assert_eq!(delayed.pending(), 1);
    }
}
