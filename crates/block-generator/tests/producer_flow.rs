//! # Block Production Flow Tests
//!
//! End-to-end runs of the producer and the daemon over the in-memory
//! adapters: ordering, bad transactions, concurrent producers and shutdown.

use std::sync::Arc;
use std::time::Duration;

use block_generator::adapters::{
    envelope_hash, DevTransaction, DevTransactionProcessor, InMemoryLedger, InMemoryTxQueue,
    LoggingCommitNotifier, ManualClock, QueuedDelayedContracts, StaticKeyProvider,
    StaticRegistry,
};
use block_generator::domain::NodeKeys;
use block_generator::{
    BlockGeneratorConfig, BlockGeneratorDaemon, BlockProducer, BlockProducerApi, ChainLock,
    GenerationOutcome, Metrics, ProducerDependencies, ScheduleConfig, SkipReason,
};
use chrono::{DateTime, Utc};
use proptest::prelude::*;
use shared_types::{BlockHeader, ProducerNode, BLOCK_VERSION};
use tokio::sync::watch;

const OWN_KEY: i64 = 10;
const GENESIS: i64 = 1_000;

fn node(key_id: i64) -> ProducerNode {
    ProducerNode {
        key_id,
        tcp_address: format!("10.0.0.{}:7078", key_id),
        api_address: format!("http://10.0.0.{}:7079", key_id),
        public_key: vec![key_id as u8; 64],
        unban_time: DateTime::<Utc>::default(),
    }
}

fn config() -> BlockGeneratorConfig {
    BlockGeneratorConfig {
        key_id: OWN_KEY,
        tick_interval_ms: 20,
        schedule: ScheduleConfig {
            first_block_time: GENESIS,
            gap_between_blocks_secs: 2,
            max_block_generation_time_ms: 2_000,
        },
        ..Default::default()
    }
}

fn head_ledger() -> Arc<InMemoryLedger> {
    let head = BlockHeader {
        block_id: 10,
        time: GENESIS - 10,
        ecosystem_id: 0,
        key_id: 20,
        node_position: 1,
        version: BLOCK_VERSION,
    };
    Arc::new(InMemoryLedger::with_head(head).unwrap())
}

fn tx(key_id: i64, time: i64, nonce: u64) -> Vec<u8> {
    DevTransaction::contract_call(key_id, 1, time, nonce, 8)
        .encode()
        .unwrap()
}

struct Node {
    producer: Arc<BlockProducer>,
    processor: Arc<DevTransactionProcessor>,
}

fn producer(
    ledger: Arc<InMemoryLedger>,
    queue: Arc<InMemoryTxQueue>,
    chain_lock: ChainLock,
) -> Node {
    let processor = Arc::new(DevTransactionProcessor::new());
    let producer = BlockProducer::new(ProducerDependencies {
        ledger,
        queue: queue.clone(),
        processor: processor.clone(),
        keys: Arc::new(StaticKeyProvider::new(NodeKeys {
            private_key: vec![7; 32],
            public_key: vec![8; 64],
        })),
        registry: Arc::new(StaticRegistry::new(vec![node(10), node(20), node(30)])),
        delayed_contracts: Arc::new(QueuedDelayedContracts::new(queue)),
        notifier: Arc::new(LoggingCommitNotifier::new()),
        clock: Arc::new(ManualClock::at_unix(GENESIS + 1)),
        chain_lock,
        metrics: Arc::new(Metrics::new()),
        config: config(),
    });
    Node {
        producer: Arc::new(producer),
        processor,
    }
}

#[tokio::test]
async fn test_three_valid_transactions_make_the_next_block() {
    let ledger = head_ledger();
    let queue = Arc::new(InMemoryTxQueue::new());
    let raws: Vec<Vec<u8>> = (0..3).map(|n| tx(100 + n, GENESIS, n as u64)).collect();
    for raw in &raws {
        queue.push(raw.clone());
    }
    let node = producer(ledger.clone(), queue.clone(), ChainLock::default());

    let outcome = node.producer.try_generate().await.unwrap();

    match outcome {
        GenerationOutcome::Produced { header, tx_count } => {
            assert_eq!(header.block_id, 11);
            assert_eq!(header.key_id, OWN_KEY);
            assert_eq!(header.node_position, 0);
            assert_eq!(tx_count, 3);
        }
        other => panic!("expected a block, got {other:?}"),
    }
    let blocks = ledger.blocks();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[1].transactions, raws);
    assert!(queue.snapshot().is_empty());
    assert_eq!(node.producer.metrics().get_blocks_produced(), 1);
}

#[tokio::test]
async fn test_rejected_transaction_is_marked_and_the_rest_committed() {
    let ledger = head_ledger();
    let queue = Arc::new(InMemoryTxQueue::new());
    let future_tx = tx(100, GENESIS + 10_000, 0);
    let good_tx = tx(101, GENESIS, 1);
    queue.push(future_tx.clone());
    queue.push(good_tx.clone());
    let node = producer(ledger.clone(), queue, ChainLock::default());

    node.producer.try_generate().await.unwrap();

    let bad = node.processor.bad_transactions();
    assert_eq!(bad.len(), 1);
    assert_eq!(bad[0].0, envelope_hash(&future_tx));
    assert_eq!(ledger.blocks()[1].transactions, vec![good_tx]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_producers_never_duplicate_a_block_id() {
    let ledger = head_ledger();
    let queue = Arc::new(InMemoryTxQueue::new());
    for n in 0..6 {
        queue.push(tx(100 + n, GENESIS, n as u64));
    }
    let chain_lock = ChainLock::new("shared");
    let a = producer(ledger.clone(), queue.clone(), chain_lock.clone());
    let b = producer(ledger.clone(), queue.clone(), chain_lock);

    let (first, second) = tokio::join!(
        tokio::spawn({
            let p = a.producer.clone();
            async move { p.try_generate().await }
        }),
        tokio::spawn({
            let p = b.producer.clone();
            async move { p.try_generate().await }
        }),
    );
    let outcomes = [first.unwrap().unwrap(), second.unwrap().unwrap()];

    let produced = outcomes
        .iter()
        .filter(|o| matches!(o, GenerationOutcome::Produced { .. }))
        .count();
    assert_eq!(produced, 1);
    assert!(outcomes
        .iter()
        .any(|o| *o == GenerationOutcome::Skipped(SkipReason::SlotAlreadyFilled)));

    let ids: Vec<i64> = ledger.blocks().iter().map(|b| b.header.block_id).collect();
    assert_eq!(ids, vec![10, 11]);
}

#[tokio::test]
async fn test_daemon_produces_then_stops_on_shutdown() {
    let ledger = head_ledger();
    let queue = Arc::new(InMemoryTxQueue::new());
    queue.push(tx(100, GENESIS, 0));
    queue.push(tx(101, GENESIS, 1));
    let node = producer(ledger.clone(), queue, ChainLock::default());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = BlockGeneratorDaemon::new(node.producer.clone(), config()).spawn(shutdown_rx);

    tokio::time::timeout(Duration::from_secs(5), async {
        while ledger.height() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    // the slot was filled, later ticks must not add blocks
    assert_eq!(ledger.height(), 2);
    assert_eq!(ledger.blocks()[1].transactions.len(), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_admitted_transactions_keep_queue_order(
        senders in prop::collection::vec(1i64..=5, 1..=40)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let ledger = head_ledger();
        let queue = Arc::new(InMemoryTxQueue::new());
        let raws: Vec<Vec<u8>> = senders
            .iter()
            .enumerate()
            .map(|(nonce, key)| tx(*key, GENESIS, nonce as u64))
            .collect();
        for raw in &raws {
            queue.push(raw.clone());
        }
        let node = producer(ledger.clone(), queue, ChainLock::default());

        let outcome = rt.block_on(node.producer.try_generate()).unwrap();

        let is_produced = matches!(outcome, GenerationOutcome::Produced { .. });
        prop_assert!(is_produced);
        prop_assert_eq!(&ledger.blocks()[1].transactions, &raws);
    }
}
