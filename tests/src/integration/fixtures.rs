//! Shared fixtures: a scripted node, an in-memory store and the checks
//! every flow repeats.

use std::sync::Arc;

use ix_01_node_client::MockNodeClient;
use ix_02_chain_store::{ChainStore, InMemoryKVStore, KvChainStore};
use ix_03_chain_sync::{SyncConfig, SyncPipeline};
use shared_types::{Address, BlockHeight, H160, U256};

pub type Store = KvChainStore<InMemoryKVStore>;

pub const ALICE: Address = H160([0xa1; 20]);
pub const BOB: Address = H160([0xb2; 20]);
pub const CAROL: Address = H160([0xc3; 20]);

pub fn delegates() -> Vec<Address> {
    vec![ALICE, BOB, CAROL]
}

/// Node with heights `0..len` and an empty store paying the configured reward.
pub fn node_and_store(
    len: u64,
    txs_per_block: u64,
) -> (Arc<MockNodeClient>, Arc<Store>, SyncConfig) {
    let config = SyncConfig::for_testing();
    let node = Arc::new(MockNodeClient::with_chain(len, delegates(), txs_per_block));
    let store = Arc::new(KvChainStore::in_memory().with_reward_unit(config.reward_unit()));
    (node, store, config)
}

pub fn pipeline(
    node: &Arc<MockNodeClient>,
    store: &Arc<Store>,
    config: &SyncConfig,
) -> SyncPipeline<MockNodeClient, Store> {
    SyncPipeline::new(node.clone(), store.clone(), config.clone())
}

/// The stored chain matches the node block for block, transaction for
/// transaction, up to `tip`.
pub fn assert_store_mirrors_node(node: &MockNodeClient, store: &Store, tip: BlockHeight) {
    for height in 0..=tip {
        let local = store.get_block_by_height(height).unwrap();
        assert_eq!(local, node.block(height), "block at height {}", height);

        let block = local.unwrap();
        let stored: Vec<_> = store
            .get_transactions_by_block(&block.hash)
            .unwrap()
            .into_iter()
            .map(|r| r.hash())
            .collect();
        assert_eq!(stored, block.transactions, "transactions at height {}", height);
    }
}

/// Every producer aggregate equals what the stored blocks add up to.
pub fn assert_aggregates_consistent(store: &Store, reward_unit: U256, tip: BlockHeight) {
    let blocks = store.get_blocks_in_range(0, tip, None).unwrap();
    for delegate in delegates() {
        let expected = blocks.iter().filter(|b| b.producer == delegate).count() as u64;
        let aggregate = store.get_producer_aggregate(&delegate).unwrap().unwrap_or_default();
        assert_eq!(aggregate.produced_blocks, expected, "blocks of {:?}", delegate);
        assert_eq!(
            aggregate.block_rewards,
            reward_unit * U256::from(expected),
            "rewards of {:?}",
            delegate
        );
    }
}
