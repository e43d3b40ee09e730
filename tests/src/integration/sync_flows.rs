//! # Sync Flows
//!
//! Node → sync pipeline → chain store, end to end:
//!
//! 1. Full sync from an empty store
//! 2. Idempotent re-sync over an already indexed range
//! 3. Reorg at height 7 over B0..B10
//! 4. Aggregates never go negative, whatever the deletion order

#[cfg(test)]
mod tests {
    use ix_02_chain_store::ChainStore;
    use ix_03_chain_sync::{SyncError, SYNC_CURSOR};
    use shared_types::{Block, U256};

    use crate::integration::fixtures::*;

    #[tokio::test]
    async fn test_full_sync_mirrors_node() {
        let (node, store, config) = node_and_store(50, 3);

        let report = pipeline(&node, &store, &config).run().await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.cursor, Some(49));
        assert_eq!(report.blocks_inserted, 50);
        assert_eq!(report.transactions_written, 150);
        assert_store_mirrors_node(&node, &store, 49);
        assert_aggregates_consistent(&store, config.reward_unit(), 49);
    }

    #[tokio::test]
    async fn test_resync_from_scratch_changes_nothing() {
        let (node, store, config) = node_and_store(25, 2);
        pipeline(&node, &store, &config).run().await.unwrap();
        let before: Vec<_> = delegates()
            .iter()
            .map(|d| store.get_producer_aggregate(d).unwrap())
            .collect();

        store.clear_cursor(SYNC_CURSOR).unwrap();
        let report = pipeline(&node, &store, &config).run().await.unwrap();

        assert_eq!(report.blocks_inserted, 0);
        assert_eq!(report.blocks_unchanged, 25);
        assert_eq!(report.transactions_written, 0);
        assert_eq!(report.cursor, Some(24));
        let after: Vec<_> = delegates()
            .iter()
            .map(|d| store.get_producer_aggregate(d).unwrap())
            .collect();
        assert_eq!(before, after);
        assert_aggregates_consistent(&store, config.reward_unit(), 24);
    }

    #[tokio::test]
    async fn test_reorg_at_seven_replaces_tail() {
        let (node, store, config) = node_and_store(11, 2);
        pipeline(&node, &store, &config).run().await.unwrap();
        let stale: Vec<Block> = (7..=10)
            .map(|h| store.get_block_by_height(h).unwrap().unwrap())
            .collect();

        node.fork_at(7, 9);
        let report = pipeline(&node, &store, &config).run().await.unwrap();

        assert_eq!(report.repair.fork_point, Some(6));
        assert_eq!(report.repair.deleted, vec![10, 9, 8, 7]);
        assert_eq!(report.start, Some(7));
        assert_eq!(report.cursor, Some(10));
        assert_store_mirrors_node(&node, &store, 10);
        for old in &stale {
            assert_eq!(store.get_block_by_hash(&old.hash).unwrap(), None);
            for tx in &old.transactions {
                assert_eq!(store.get_transaction(tx).unwrap(), None);
            }
        }
        assert_aggregates_consistent(&store, config.reward_unit(), 10);
    }

    #[tokio::test]
    async fn test_reorg_beyond_limit_leaves_store_alone() {
        let (node, store, mut config) = node_and_store(11, 1);
        pipeline(&node, &store, &config).run().await.unwrap();

        config.max_reorg_depth = 3;
        node.fork_at(5, 4);
        let result = pipeline(&node, &store, &config).run().await;

        assert!(matches!(result, Err(SyncError::ReorgTooDeep { .. })));
        assert_eq!(store.get_cursor(SYNC_CURSOR).unwrap(), Some(10));
        assert_eq!(store.latest_height().unwrap(), Some(10));
        assert_ne!(store.get_block_by_height(5).unwrap(), node.block(5));
    }

    #[tokio::test]
    async fn test_aggregates_never_go_negative() {
        let (node, store, config) = node_and_store(6, 0);
        pipeline(&node, &store, &config).run().await.unwrap();

        // Stored without going through the pipeline: no aggregate credit.
        let orphan = Block {
            number: 6,
            timestamp: 1_600_000_006,
            producer: ALICE,
            delegates: delegates(),
            ..Default::default()
        }
        .seal();
        store.upsert_blocks(&[orphan]).unwrap();
        let alice = store.get_producer_aggregate(&ALICE).unwrap().unwrap();

        for height in (0..=6).rev() {
            store.delete_block_and_transactions(height).unwrap();
        }
        // A second round finds nothing to delete.
        for height in 0..=6 {
            assert_eq!(store.delete_block_and_transactions(height).unwrap(), None);
        }

        assert_eq!(store.latest_height().unwrap(), None);
        for delegate in delegates() {
            let aggregate = store.get_producer_aggregate(&delegate).unwrap().unwrap_or_default();
            assert_eq!(aggregate.produced_blocks, 0, "{:?}", delegate);
            assert_eq!(aggregate.block_rewards, U256::zero(), "{:?}", delegate);
        }
        assert_eq!(alice.produced_blocks, 2);
    }

    #[tokio::test]
    async fn test_interrupted_sync_resumes_without_gaps() {
        let (node, store, config) = node_and_store(30, 1);
        node.fail_block(12);

        let first = pipeline(&node, &store, &config).run().await.unwrap();
        assert_eq!(first.cursor, Some(11));
        assert_eq!(first.failed_heights.first(), Some(&12));

        node.clear_failures();
        node.extend(5, 0);
        let second = pipeline(&node, &store, &config).run().await.unwrap();

        assert_eq!(second.start, Some(12));
        assert_eq!(second.cursor, Some(34));
        assert_store_mirrors_node(&node, &store, 34);
        assert_aggregates_consistent(&store, config.reward_unit(), 34);
    }
}
