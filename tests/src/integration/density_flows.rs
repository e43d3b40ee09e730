//! # Density Flows
//!
//! Blocks reach the store through the real sync pipeline (or are planted
//! directly for the hand-checked scenario), then the density engine reads
//! them back together with the node's stake snapshot.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ix_01_node_client::MockNodeClient;
    use ix_02_chain_store::{ChainStore, KvChainStore};
    use ix_03_chain_sync::{SyncConfig, SyncPipeline};
    use ix_04_delegate_density::{
        DensityApi, DensityConfig, DensityEngine, DensityLookup, DensityReport, DposConfig,
    };
    use shared_types::{Address, Block, H160};

    use crate::integration::fixtures::Store;

    const A: Address = H160([0xaa; 20]);
    const B: Address = H160([0xbb; 20]);
    const BASE: u64 = 1_600_000_000;

    fn engine(
        node: Arc<MockNodeClient>,
        store: Arc<Store>,
        windows: Vec<u64>,
        turn_block_count: u64,
    ) -> DensityEngine<MockNodeClient, Store> {
        let config = DensityConfig {
            windows,
            dpos: DposConfig {
                period: 1,
                turn_block_count,
                delegate_count: 2,
            },
        };
        DensityEngine::new(node, store, config)
    }

    async fn report(
        engine: &DensityEngine<MockNodeClient, Store>,
        address: Option<Address>,
    ) -> DensityReport {
        match engine.delegate_density(address).await.unwrap() {
            DensityLookup::Found(report) => report,
            other => panic!("expected a report, got {:?}", other),
        }
    }

    /// Rotation A A B B A A over slots 0..6. The slot-2 block was signed by
    /// A instead of B and slot 3 has no block.
    #[tokio::test]
    async fn test_two_delegate_scenario() {
        let store = Arc::new(KvChainStore::in_memory());
        let blocks: Vec<Block> = [0u64, 1, 2, 4, 5]
            .into_iter()
            .enumerate()
            .map(|(number, slot)| {
                Block {
                    number: number as u64,
                    timestamp: BASE + slot,
                    producer: A,
                    delegates: vec![A, B],
                    signature: vec![slot as u8],
                    ..Default::default()
                }
                .seal()
            })
            .collect();
        store.upsert_blocks(&blocks).unwrap();
        let node = Arc::new(MockNodeClient::with_chain(1, vec![A, B], 0));

        let report = report(&engine(node, store, vec![6], 2), None).await;

        assert_eq!(report.total_seconds_examined, 6);
        assert_eq!(report.total_missed_blocks, 2);
        let a = &report.stats_for(&A).unwrap()[0];
        assert_eq!((a.total_blocks, a.missed_blocks, a.density), (4, 0, 1.0));
        let b = &report.stats_for(&B).unwrap()[0];
        assert_eq!((b.total_blocks, b.missed_blocks, b.density), (2, 2, 0.0));
        assert_eq!((a.stake, b.stake), (1_000, 2_000));
    }

    /// The mock node produces round-robin one second apart, which is the
    /// schedule for a one-block turn.
    #[tokio::test]
    async fn test_synced_chain_on_schedule_has_full_density() {
        let node = Arc::new(MockNodeClient::with_chain(12, vec![A, B], 1));
        let store = Arc::new(KvChainStore::in_memory());
        SyncPipeline::new(node.clone(), store.clone(), SyncConfig::for_testing())
            .run()
            .await
            .unwrap();

        let report = report(&engine(node, store, vec![12, 20], 1), None).await;

        assert_eq!(report.total_seconds_examined, 20);
        for address in [A, B] {
            let stats = report.stats_for(&address).unwrap();
            assert_eq!((stats[0].total_blocks, stats[0].missed_blocks), (6, 0));
            assert_eq!(stats[0].density, 1.0);
            // Eight seconds before genesis: four empty turns each.
            assert_eq!((stats[1].total_blocks, stats[1].missed_blocks), (10, 4));
            assert!((stats[1].density - 0.6).abs() < 1e-9);
        }
        assert_eq!(report.total_missed_blocks, 8);
    }

    #[tokio::test]
    async fn test_report_totals_agree_with_per_delegate_records() {
        let node = Arc::new(MockNodeClient::with_chain(40, vec![A, B], 0));
        let store = Arc::new(KvChainStore::in_memory());
        SyncPipeline::new(node.clone(), store.clone(), SyncConfig::for_testing())
            .run()
            .await
            .unwrap();

        let report = report(&engine(node, store, vec![300, 10, 60], 6), None).await;

        assert_eq!(report.total_seconds_examined, 300);
        let mut missed = 0;
        let mut scheduled = 0;
        for records in &report.delegates {
            let windows: Vec<u64> = records.iter().map(|r| r.seconds_examined).collect();
            assert_eq!(windows, vec![10, 60, 300]);
            let longest = records.last().unwrap();
            missed += longest.missed_blocks;
            scheduled += longest.total_blocks;
        }
        assert_eq!(missed, report.total_missed_blocks);
        assert_eq!(scheduled, 300);
    }

    #[tokio::test]
    async fn test_filter_and_unknown_address() {
        let node = Arc::new(MockNodeClient::with_chain(8, vec![A, B], 0));
        let store = Arc::new(KvChainStore::in_memory());
        SyncPipeline::new(node.clone(), store.clone(), SyncConfig::for_testing())
            .run()
            .await
            .unwrap();
        let engine = engine(node, store, vec![8], 1);

        let only_b = report(&engine, Some(B)).await;
        assert_eq!(only_b.address, Some(B));
        assert_eq!(only_b.delegates.len(), 1);
        assert_eq!(only_b.stats_for(&B).unwrap()[0].total_blocks, 4);

        let outsider = H160([0x01; 20]);
        assert_eq!(
            engine.delegate_density(Some(outsider)).await.unwrap(),
            DensityLookup::NotInRotation(outsider)
        );
    }
}
