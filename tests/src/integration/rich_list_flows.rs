//! # Rich-List Flows
//!
//! Runs the runtime commands against a file-backed store: sync, then
//! refresh balances, then reopen the database and resume.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use indexer_runtime::commands::{self, CommandError};
    use indexer_runtime::container::{IndexerConfig, IndexerContainer, StoreBackend};
    use ix_01_node_client::MockNodeClient;
    use ix_02_chain_store::ChainStore;
    use ix_03_chain_sync::{RunLock, SyncError, RICH_LIST_CURSOR, SYNC_CURSOR};
    use shared_types::{Address, U256, WEI_PER_BALANCE_UNIT};
    use tempfile::TempDir;
    use tokio::sync::watch;

    use crate::integration::fixtures::*;

    fn units(n: u64) -> U256 {
        U256::from(n) * U256::from(WEI_PER_BALANCE_UNIT)
    }

    fn config(dir: &TempDir, db_name: &str) -> IndexerConfig {
        let mut config = IndexerConfig::default();
        config.storage.backend = StoreBackend::File;
        config.storage.data_dir = dir.path().to_path_buf();
        config.storage.db_name = format!("{}-{}", db_name, std::process::id());
        config.sync.workers = 2;
        config.rich_list.size = 3;
        config
    }

    fn node() -> Arc<MockNodeClient> {
        let node = MockNodeClient::with_chain(6, delegates(), 1);
        node.set_balance(ALICE, units(500), 0);
        node.set_balance(BOB, units(300), 0);
        node.set_balance(CAROL, U256::zero(), 400);
        node.set_balance(Address::from_low_u64_be(0x1000), units(100), 0);
        Arc::new(node)
    }

    #[tokio::test]
    async fn test_rich_list_keeps_top_entries_and_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let node = node();
        {
            let container = IndexerContainer::with_node(config(&dir, "rich-flow"), node.clone())
                .unwrap();
            commands::fetch_blocks(&container, watch::channel(false).1)
                .await
                .unwrap();

            let report = commands::compute_rich(&container).await.unwrap();

            // Three producers, six senders, one recipient.
            assert_eq!(report.accounts_updated, 10);
            assert_eq!(report.purged, 7);
            assert_eq!(report.cursor, 6);
            let top: Vec<(Address, u64)> = container
                .store
                .top_balances(10)
                .unwrap()
                .into_iter()
                .map(|e| (e.address, e.total()))
                .collect();
            assert_eq!(top, vec![(ALICE, 500), (CAROL, 400), (BOB, 300)]);
        }

        let container =
            IndexerContainer::with_node(config(&dir, "rich-flow"), node.clone()).unwrap();
        assert_eq!(container.store.get_cursor(SYNC_CURSOR).unwrap(), Some(5));
        assert_eq!(container.store.get_cursor(RICH_LIST_CURSOR).unwrap(), Some(6));
        assert_eq!(container.store.balance_count().unwrap(), 3);

        let again = commands::compute_rich(&container).await.unwrap();
        assert_eq!(again.blocks_scanned, 0);
    }

    #[tokio::test]
    async fn test_rich_list_refuses_concurrent_pass() {
        let dir = TempDir::new().unwrap();
        let container =
            IndexerContainer::with_node(config(&dir, "rich-locked"), node()).unwrap();
        let _held = RunLock::for_rich_list(&container.config.storage.db_name).unwrap();

        let result = commands::compute_rich(&container).await;

        assert!(matches!(
            result,
            Err(CommandError::Sync(SyncError::Lock(_)))
        ));
    }
}
