//! # Sync Pipeline Tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ix_01_node_client::adapters::mock::generated_tx_hash;
use ix_01_node_client::MockNodeClient;
use ix_02_chain_store::{
    BlockUpsertOutcome, ChainStore, InMemoryKVStore, KVStoreError, KvChainStore, StoreError,
    TxUpsertOutcome,
};
use shared_types::{
    Address, BalanceEntry, Block, BlockHeight, EnsEntry, Hash, ProducerAggregate,
    TimestampCondition, TransactionRecord, U256,
};
use tokio::sync::watch;

use super::*;
use crate::domain::SyncError;

type Store = KvChainStore<InMemoryKVStore>;

fn delegates() -> Vec<Address> {
    vec![
        Address::repeat_byte(0xa1),
        Address::repeat_byte(0xb2),
        Address::repeat_byte(0xc3),
    ]
}

fn setup(len: u64, txs_per_block: u64) -> (Arc<MockNodeClient>, Arc<Store>, SyncConfig) {
    let config = SyncConfig::for_testing();
    let node = Arc::new(MockNodeClient::with_chain(len, delegates(), txs_per_block));
    let store = Arc::new(KvChainStore::in_memory().with_reward_unit(config.reward_unit()));
    (node, store, config)
}

fn pipeline(
    node: &Arc<MockNodeClient>,
    store: &Arc<Store>,
    config: &SyncConfig,
) -> SyncPipeline<MockNodeClient, Store> {
    SyncPipeline::new(node.clone(), store.clone(), config.clone())
}

fn stored_heights(store: &Store, to: BlockHeight) -> Vec<BlockHeight> {
    store
        .get_blocks_in_range(0, to, None)
        .unwrap()
        .into_iter()
        .map(|b| b.number)
        .collect()
}

/// Sum of `produced_blocks` over every delegate, checked against the store.
fn assert_aggregates_match_store(store: &Store, config: &SyncConfig, to: BlockHeight) {
    let blocks = store.get_blocks_in_range(0, to, None).unwrap();
    for delegate in delegates() {
        let expected = blocks.iter().filter(|b| b.producer == delegate).count() as u64;
        let produced = store
            .get_producer_aggregate(&delegate)
            .unwrap()
            .map(|a| (a.produced_blocks, a.block_rewards))
            .unwrap_or_default();
        assert_eq!(produced.0, expected, "block count for {:?}", delegate);
        assert_eq!(
            produced.1,
            config.reward_unit() * U256::from(expected),
            "rewards for {:?}",
            delegate
        );
    }
}

#[tokio::test]
async fn test_full_sync_indexes_every_block_and_transaction() {
    let (node, store, config) = setup(20, 2);

    let report = pipeline(&node, &store, &config).run().await.unwrap();

    assert_eq!(report.tip, 19);
    assert_eq!(report.start, Some(0));
    assert_eq!(report.blocks_inserted, 20);
    assert_eq!(report.transactions_written, 40);
    assert!(report.is_complete());
    assert_eq!(report.cursor, Some(19));
    assert_eq!(store.get_cursor(SYNC_CURSOR).unwrap(), Some(19));
    assert_eq!(stored_heights(&store, 19), (0..20).collect::<Vec<_>>());

    let b7 = store.get_block_by_height(7).unwrap().unwrap();
    assert_eq!(Some(b7.clone()), node.block(7));
    let txs = store.get_transactions_by_block(&b7.hash).unwrap();
    assert_eq!(txs.len(), 2);
    assert!(txs.iter().all(|r| r.tx.timestamp == b7.timestamp));

    assert_aggregates_match_store(&store, &config, 19);
}

#[tokio::test]
async fn test_resync_from_scratch_is_idempotent() {
    let (node, store, config) = setup(20, 2);
    pipeline(&node, &store, &config).run().await.unwrap();
    let before: Vec<_> = delegates()
        .iter()
        .map(|d| store.get_producer_aggregate(d).unwrap())
        .collect();

    store.clear_cursor(SYNC_CURSOR).unwrap();
    let report = pipeline(&node, &store, &config).run().await.unwrap();

    assert_eq!(report.blocks_inserted, 0);
    assert_eq!(report.blocks_unchanged, 20);
    assert_eq!(report.transactions_written, 0);
    assert_eq!(report.transactions_unchanged, 40);
    assert_eq!(report.cursor, Some(19));
    let after: Vec<_> = delegates()
        .iter()
        .map(|d| store.get_producer_aggregate(d).unwrap())
        .collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_already_at_tip_fetches_nothing() {
    let (node, store, config) = setup(6, 1);
    pipeline(&node, &store, &config).run().await.unwrap();
    let calls = node.block_calls();

    let report = pipeline(&node, &store, &config).run().await.unwrap();

    assert_eq!(report.start, None);
    assert_eq!(report.cursor, Some(5));
    // Only the reorg walk touched the node: one lookup at the head.
    assert_eq!(node.block_calls(), calls + 1);
}

#[tokio::test]
async fn test_resume_fetches_only_new_heights() {
    let (node, store, config) = setup(10, 1);
    pipeline(&node, &store, &config).run().await.unwrap();

    node.extend(5, 0);
    let report = pipeline(&node, &store, &config).run().await.unwrap();

    assert_eq!(report.start, Some(10));
    assert_eq!(report.blocks_inserted, 5);
    assert_eq!(report.cursor, Some(14));
    assert_eq!(stored_heights(&store, 14).len(), 15);
    assert_aggregates_match_store(&store, &config, 14);
}

#[tokio::test]
async fn test_reorg_is_repaired_from_fork_point() {
    let (node, store, config) = setup(11, 2);
    pipeline(&node, &store, &config).run().await.unwrap();
    let old_b8 = store.get_block_by_height(8).unwrap().unwrap();

    node.fork_at(7, 1);
    let report = pipeline(&node, &store, &config).run().await.unwrap();

    assert_eq!(report.repair.fork_point, Some(6));
    assert_eq!(report.repair.deleted, vec![10, 9, 8, 7]);
    assert_eq!(report.start, Some(7));
    assert_eq!(report.blocks_inserted, 4);
    assert_eq!(report.cursor, Some(10));

    for h in 0..=10 {
        assert_eq!(store.get_block_by_height(h).unwrap(), node.block(h), "height {}", h);
    }
    assert!(store.get_block_by_hash(&old_b8.hash).unwrap().is_none());
    assert!(store
        .get_transaction(&generated_tx_hash(8, 0, 0))
        .unwrap()
        .is_none());
    assert!(store
        .get_transaction(&generated_tx_hash(8, 0, 1))
        .unwrap()
        .is_some());
    assert_aggregates_match_store(&store, &config, 10);
}

#[tokio::test]
async fn test_reorg_deeper_than_limit_leaves_store_untouched() {
    let (node, store, mut config) = setup(10, 1);
    pipeline(&node, &store, &config).run().await.unwrap();
    let before: Vec<_> = (0..10)
        .map(|h| store.get_block_by_height(h).unwrap())
        .collect();

    config.max_reorg_depth = 2;
    node.fork_at(5, 3);
    let err = pipeline(&node, &store, &config).run().await.unwrap_err();

    assert!(matches!(err, SyncError::ReorgTooDeep { from: 9, limit: 2 }));
    assert!(err.is_integrity());
    let after: Vec<_> = (0..10)
        .map(|h| store.get_block_by_height(h).unwrap())
        .collect();
    assert_eq!(before, after);
    assert_eq!(store.get_cursor(SYNC_CURSOR).unwrap(), Some(9));
}

#[tokio::test]
async fn test_failed_block_fetch_holds_cursor_below_gap() {
    let (node, store, config) = setup(20, 1);
    node.fail_block(12);

    let report = pipeline(&node, &store, &config).run().await.unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failed_heights.first(), Some(&12));
    assert_eq!(report.cursor, Some(11));
    assert!(store.get_block_by_height(12).unwrap().is_none());

    node.clear_failures();
    let report = pipeline(&node, &store, &config).run().await.unwrap();

    assert_eq!(report.start, Some(12));
    assert!(report.is_complete());
    assert_eq!(report.cursor, Some(19));
    assert_eq!(stored_heights(&store, 19).len(), 20);
    assert_aggregates_match_store(&store, &config, 19);
}

#[tokio::test]
async fn test_failed_transaction_fetch_holds_cursor_below_its_block() {
    let (node, store, config) = setup(10, 2);
    let missing = generated_tx_hash(5, 1, 0);
    node.fail_transaction(missing);

    let report = pipeline(&node, &store, &config).run().await.unwrap();

    assert_eq!(report.failed_heights, vec![5]);
    assert_eq!(report.cursor, Some(4));
    assert!(store.get_transaction(&missing).unwrap().is_none());

    node.clear_failures();
    let report = pipeline(&node, &store, &config).run().await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.cursor, Some(9));
    assert!(store.get_transaction(&missing).unwrap().is_some());
}

#[tokio::test]
async fn test_unreachable_node_fails_before_any_write() {
    let (node, store, config) = setup(5, 1);
    node.set_tip_unavailable(true);

    let err = pipeline(&node, &store, &config).run().await.unwrap_err();

    assert!(matches!(err, SyncError::Node(_)));
    assert!(err.is_transient());
    assert_eq!(store.latest_height().unwrap(), None);
    assert_eq!(store.get_cursor(SYNC_CURSOR).unwrap(), None);
}

#[tokio::test]
async fn test_shutdown_before_start_writes_no_cursor() {
    let (node, store, config) = setup(10, 1);
    let (_tx, rx) = watch::channel(true);

    let report = pipeline(&node, &store, &config)
        .with_shutdown(rx)
        .run()
        .await
        .unwrap();

    assert!(report.interrupted);
    assert!(!report.is_complete());
    assert_eq!(report.cursor, None);
    assert_eq!(store.get_cursor(SYNC_CURSOR).unwrap(), None);
    assert_eq!(node.block_calls(), 0);
}

#[tokio::test]
async fn test_local_blocks_above_node_tip_are_left_alone() {
    let (node, store, config) = setup(10, 1);
    pipeline(&node, &store, &config).run().await.unwrap();

    node.truncate(6);
    let report = pipeline(&node, &store, &config).run().await.unwrap();

    assert!(!report.repair.repaired());
    assert_eq!(report.repair.fork_point, Some(6));
    assert_eq!(report.repair.ahead_of_tip, Some(9));
    assert_eq!(report.start, None);
    assert!(!report.is_complete());
    assert_eq!(store.latest_height().unwrap(), Some(9));
}

/// Store whose producer credits fail while `failing` is set.
struct CreditOutage {
    inner: Store,
    failing: AtomicBool,
}

impl CreditOutage {
    fn new(inner: Store) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(true),
        }
    }

    fn outage(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(KVStoreError::IOError {
                message: "disk unavailable".to_string(),
            }));
        }
        Ok(())
    }
}

impl ChainStore for CreditOutage {
    fn get_cursor(&self, name: &str) -> Result<Option<BlockHeight>, StoreError> {
        self.inner.get_cursor(name)
    }

    fn set_cursor(&self, name: &str, height: BlockHeight) -> Result<(), StoreError> {
        self.inner.set_cursor(name, height)
    }

    fn clear_cursor(&self, name: &str) -> Result<(), StoreError> {
        self.inner.clear_cursor(name)
    }

    fn latest_height(&self) -> Result<Option<BlockHeight>, StoreError> {
        self.inner.latest_height()
    }

    fn upsert_blocks(&self, blocks: &[Block]) -> Result<BlockUpsertOutcome, StoreError> {
        self.inner.upsert_blocks(blocks)
    }

    fn get_block_by_height(&self, height: BlockHeight) -> Result<Option<Block>, StoreError> {
        self.inner.get_block_by_height(height)
    }

    fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, StoreError> {
        self.inner.get_block_by_hash(hash)
    }

    fn get_blocks_in_range(
        &self,
        from: BlockHeight,
        to: BlockHeight,
        producer: Option<Address>,
    ) -> Result<Vec<Block>, StoreError> {
        self.inner.get_blocks_in_range(from, to, producer)
    }

    fn get_blocks_by_timestamp(
        &self,
        condition: TimestampCondition,
        producer: Option<Address>,
        limit: Option<usize>,
    ) -> Result<Vec<Block>, StoreError> {
        self.inner.get_blocks_by_timestamp(condition, producer, limit)
    }

    fn delete_block_and_transactions(
        &self,
        height: BlockHeight,
    ) -> Result<Option<Block>, StoreError> {
        self.inner.delete_block_and_transactions(height)
    }

    fn upsert_transactions(
        &self,
        records: &[TransactionRecord],
    ) -> Result<TxUpsertOutcome, StoreError> {
        self.inner.upsert_transactions(records)
    }

    fn get_transaction(&self, hash: &Hash) -> Result<Option<TransactionRecord>, StoreError> {
        self.inner.get_transaction(hash)
    }

    fn get_transactions_by_block(
        &self,
        block_hash: &Hash,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        self.inner.get_transactions_by_block(block_hash)
    }

    fn upsert_producer_aggregate(
        &self,
        producer: Address,
        block_delta: u64,
        reward_delta: U256,
    ) -> Result<ProducerAggregate, StoreError> {
        self.outage()?;
        self.inner
            .upsert_producer_aggregate(producer, block_delta, reward_delta)
    }

    fn credit_producer(
        &self,
        producer: Address,
        blocks: &[(BlockHeight, Hash)],
        reward_delta: U256,
    ) -> Result<ProducerAggregate, StoreError> {
        self.outage()?;
        self.inner.credit_producer(producer, blocks, reward_delta)
    }

    fn get_producer_aggregate(
        &self,
        producer: &Address,
    ) -> Result<Option<ProducerAggregate>, StoreError> {
        self.inner.get_producer_aggregate(producer)
    }

    fn upsert_balance(&self, entry: &BalanceEntry) -> Result<(), StoreError> {
        self.inner.upsert_balance(entry)
    }

    fn get_balance(&self, address: &Address) -> Result<Option<BalanceEntry>, StoreError> {
        self.inner.get_balance(address)
    }

    fn top_balances(&self, limit: usize) -> Result<Vec<BalanceEntry>, StoreError> {
        self.inner.top_balances(limit)
    }

    fn balance_count(&self) -> Result<usize, StoreError> {
        self.inner.balance_count()
    }

    fn purge_balances_below(&self, threshold: u64) -> Result<usize, StoreError> {
        self.inner.purge_balances_below(threshold)
    }

    fn upsert_ens_entry(&self, entry: &EnsEntry) -> Result<(), StoreError> {
        self.inner.upsert_ens_entry(entry)
    }

    fn get_ens_entry(&self, name_hash: &Hash) -> Result<Option<EnsEntry>, StoreError> {
        self.inner.get_ens_entry(name_hash)
    }

    fn ens_count(&self) -> Result<usize, StoreError> {
        self.inner.ens_count()
    }

    fn ens_entries_after(
        &self,
        after: Option<&Hash>,
        limit: usize,
    ) -> Result<Vec<EnsEntry>, StoreError> {
        self.inner.ens_entries_after(after, limit)
    }
}

#[tokio::test]
async fn test_failed_credit_flush_is_healed_by_next_pass() {
    let (node, _, config) = setup(10, 1);
    let store = Arc::new(CreditOutage::new(
        KvChainStore::in_memory().with_reward_unit(config.reward_unit()),
    ));
    let sync = SyncPipeline::new(node.clone(), store.clone(), config.clone());

    let report = sync.run().await.unwrap();
    assert!(report.store_failed);
    assert!(!report.is_complete());
    assert_eq!(report.cursor, None);
    assert_eq!(store.latest_height().unwrap(), Some(9));
    for delegate in delegates() {
        assert_eq!(store.get_producer_aggregate(&delegate).unwrap(), None);
    }

    store.failing.store(false, Ordering::SeqCst);
    let report = sync.run().await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.cursor, Some(9));
    assert_eq!(report.blocks_inserted, 0);
    assert_eq!(report.blocks_unchanged, 10);
    assert_eq!(report.blocks_recredited, 10);
    assert_aggregates_match_store(&store.inner, &config, 9);

    // Already credited: a full re-sync leaves the aggregates alone.
    store.clear_cursor(SYNC_CURSOR).unwrap();
    let report = sync.run().await.unwrap();
    assert_eq!(report.blocks_recredited, 0);
    assert_aggregates_match_store(&store.inner, &config, 9);
}
