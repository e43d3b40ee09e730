//! # Rich List
//!
//! Batch job over the already indexed chain: every address seen as a block
//! producer or transaction party in a bounded range is re-queried for its
//! live balance and stake, and the balances table is trimmed back to the
//! configured size.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use ix_01_node_client::NodeClient;
use ix_02_chain_store::ChainStore;
use shared_types::{Address, BalanceEntry, BlockHeight, H160, U256, WEI_PER_BALANCE_UNIT};
use tracing::{debug, info, warn};

use crate::config::{RichListConfig, RICH_LIST_CURSOR};
use crate::domain::{RichListReport, SyncError};

/// `0x…0101`, the system contract. Never listed.
pub const SYSTEM_CONTRACT: Address = H160([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01, 0x01,
]);

/// Wei to 4-decimal fixed point, saturating.
pub fn wei_to_units(wei: U256) -> u64 {
    let units = wei / U256::from(WEI_PER_BALANCE_UNIT);
    if units > U256::from(u64::MAX) {
        u64::MAX
    } else {
        units.low_u64()
    }
}

pub struct RichListJob<N, S> {
    node: Arc<N>,
    store: Arc<S>,
    config: RichListConfig,
}

impl<N, S> RichListJob<N, S>
where
    N: NodeClient,
    S: ChainStore,
{
    pub fn new(node: Arc<N>, store: Arc<S>, config: RichListConfig) -> Self {
        Self {
            node,
            store,
            config,
        }
    }

    /// Run one pass starting at the stored cursor.
    ///
    /// Per-address node failures are logged and counted, never fatal.
    pub async fn run(&self) -> Result<RichListReport, SyncError> {
        let started = Instant::now();
        let from = self.store.get_cursor(RICH_LIST_CURSOR)?.unwrap_or(0);
        let mut report = RichListReport {
            from,
            cursor: from,
            ..Default::default()
        };

        let tip = self.node.tip_height().await?;
        let Some(local_head) = self.store.latest_height()? else {
            info!("[ix-03] 💰 Nothing indexed yet; rich list skipped");
            return Ok(report);
        };
        let span = self.config.max_blocks.max(1) - 1;
        let to = tip.min(local_head).min(from.saturating_add(span));
        if from > to {
            info!("[ix-03] 💰 Rich list already covers height {}", to);
            return Ok(report);
        }

        let seen = self.collect_addresses(from, to, &mut report)?;
        info!(
            "[ix-03] 💰 Refreshing {} addresses seen in {} blocks from {}",
            seen.len(),
            report.blocks_scanned,
            from
        );

        for (address, block_number) in seen {
            match self.fetch_entry(address, block_number).await {
                Ok(entry) => {
                    self.store.upsert_balance(&entry)?;
                    report.accounts_updated += 1;
                }
                Err(e) => {
                    warn!(?address, "[ix-03] ⚠️ Balance lookup failed: {}", e);
                    report.accounts_failed += 1;
                }
            }
        }
        ix_telemetry::RICH_LIST_UPDATES.inc_by(report.accounts_updated as u64);

        if report.blocks_scanned > 0 {
            report.cursor = from + report.blocks_scanned;
            self.store.set_cursor(RICH_LIST_CURSOR, report.cursor)?;
        }
        report.purged = self.purge()?;

        info!(
            "[ix-03] 💰 Rich list pass done in {:.3}s: {} updated, {} failed, {} purged, next height {}",
            started.elapsed().as_secs_f64(),
            report.accounts_updated,
            report.accounts_failed,
            report.purged,
            report.cursor
        );
        Ok(report)
    }

    /// Addresses in `from..=to` with the last height each was seen at.
    ///
    /// Stops at the first height not in the store, or before a block once
    /// `max_accounts` addresses are collected.
    fn collect_addresses(
        &self,
        from: BlockHeight,
        to: BlockHeight,
        report: &mut RichListReport,
    ) -> Result<BTreeMap<Address, BlockHeight>, SyncError> {
        let mut seen = BTreeMap::new();
        for height in from..=to {
            if seen.len() >= self.config.max_accounts {
                debug!("[ix-03] Account cap reached before block {}", height);
                break;
            }
            let Some(block) = self.store.get_block_by_height(height)? else {
                debug!("[ix-03] Block {} not indexed; rich list stops here", height);
                break;
            };

            let records = self.store.get_transactions_by_block(&block.hash)?;
            let parties = std::iter::once(block.producer)
                .chain(records.iter().flat_map(|r| r.parties()));
            for address in parties {
                if address != SYSTEM_CONTRACT {
                    seen.insert(address, height);
                }
            }
            report.blocks_scanned += 1;
        }
        Ok(seen)
    }

    async fn fetch_entry(
        &self,
        address: Address,
        block_number: BlockHeight,
    ) -> Result<BalanceEntry, SyncError> {
        let balance = self.node.get_balance(address).await?;
        let staked = self.node.get_stake(address).await?;
        Ok(BalanceEntry {
            address,
            liquid: wei_to_units(balance),
            staked,
            block_number,
        })
    }

    /// Drop everything below the `size`-th largest total.
    fn purge(&self) -> Result<usize, SyncError> {
        let size = self.config.size;
        if size == 0 || self.store.balance_count()? <= size {
            return Ok(0);
        }
        let Some(threshold) = self.store.top_balances(size)?.last().map(BalanceEntry::total) else {
            return Ok(0);
        };
        let purged = self.store.purge_balances_below(threshold)?;
        debug!("[ix-03] Purged {} balances below {}", purged, threshold);
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::pipeline::SyncPipeline;
    use ix_01_node_client::MockNodeClient;
    use ix_02_chain_store::{InMemoryKVStore, KvChainStore};

    type Store = KvChainStore<InMemoryKVStore>;

    const A: Address = H160([0xa1; 20]);
    const B: Address = H160([0xb2; 20]);

    fn units(n: u64) -> U256 {
        U256::from(n) * U256::from(WEI_PER_BALANCE_UNIT)
    }

    async fn synced(len: u64, delegates: Vec<Address>) -> (Arc<MockNodeClient>, Arc<Store>) {
        let node = Arc::new(MockNodeClient::with_chain(len, delegates, 1));
        let store = Arc::new(KvChainStore::in_memory());
        SyncPipeline::new(node.clone(), store.clone(), SyncConfig::for_testing())
            .run()
            .await
            .unwrap();
        (node, store)
    }

    fn job(
        node: &Arc<MockNodeClient>,
        store: &Arc<Store>,
        config: RichListConfig,
    ) -> RichListJob<MockNodeClient, Store> {
        RichListJob::new(node.clone(), store.clone(), config)
    }

    #[test]
    fn test_wei_conversion_truncates_and_saturates() {
        assert_eq!(wei_to_units(units(42) + U256::from(1)), 42);
        assert_eq!(wei_to_units(U256::zero()), 0);
        assert_eq!(wei_to_units(U256::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn test_pass_refreshes_every_seen_address() {
        let (node, store) = synced(5, vec![A, B]).await;
        node.set_balance(A, units(125_000), 7);

        let report = job(&node, &store, RichListConfig::default()).run().await.unwrap();

        // A, B, five senders and one recipient.
        assert_eq!(report.blocks_scanned, 5);
        assert_eq!(report.accounts_updated, 8);
        assert_eq!(report.accounts_failed, 0);
        assert_eq!(report.cursor, 5);
        assert_eq!(store.get_cursor(RICH_LIST_CURSOR).unwrap(), Some(5));

        let entry = store.get_balance(&A).unwrap().unwrap();
        assert_eq!(entry.liquid, 125_000);
        assert_eq!(entry.staked, 7);
        assert_eq!(entry.block_number, 4);

        let again = job(&node, &store, RichListConfig::default()).run().await.unwrap();
        assert_eq!(again.blocks_scanned, 0);
        assert_eq!(again.cursor, 5);
    }

    #[tokio::test]
    async fn test_pass_is_bounded_by_max_blocks() {
        let (node, store) = synced(5, vec![A]).await;
        let config = RichListConfig {
            max_blocks: 2,
            ..Default::default()
        };

        let first = job(&node, &store, config.clone()).run().await.unwrap();
        let second = job(&node, &store, config.clone()).run().await.unwrap();
        let third = job(&node, &store, config).run().await.unwrap();

        assert_eq!((first.from, first.cursor), (0, 2));
        assert_eq!((second.from, second.cursor), (2, 4));
        assert_eq!((third.from, third.cursor, third.blocks_scanned), (4, 5, 1));
    }

    #[tokio::test]
    async fn test_account_cap_stops_before_next_block() {
        let (node, store) = synced(5, vec![A]).await;
        let config = RichListConfig {
            max_accounts: 3,
            ..Default::default()
        };

        let report = job(&node, &store, config).run().await.unwrap();

        assert_eq!(report.blocks_scanned, 1);
        assert_eq!(report.accounts_updated, 3);
        assert_eq!(report.cursor, 1);
    }

    #[tokio::test]
    async fn test_system_contract_is_never_listed() {
        let (node, store) = synced(4, vec![SYSTEM_CONTRACT, B]).await;
        node.set_balance(SYSTEM_CONTRACT, units(1_000_000), 0);

        job(&node, &store, RichListConfig::default()).run().await.unwrap();

        assert!(store.get_balance(&SYSTEM_CONTRACT).unwrap().is_none());
        assert!(store.get_balance(&B).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_lookup_is_counted_not_fatal() {
        let (node, store) = synced(4, vec![A, B]).await;
        node.fail_account(B);

        let report = job(&node, &store, RichListConfig::default()).run().await.unwrap();

        assert_eq!(report.accounts_failed, 1);
        assert!(store.get_balance(&B).unwrap().is_none());
        assert!(store.get_balance(&A).unwrap().is_some());
        assert_eq!(report.cursor, 4);
    }

    #[tokio::test]
    async fn test_purge_keeps_top_entries() {
        let (node, store) = synced(5, vec![A, B]).await;
        node.set_balance(A, units(300), 0);
        node.set_balance(B, units(150), 50);
        let config = RichListConfig {
            size: 2,
            ..Default::default()
        };

        let report = job(&node, &store, config).run().await.unwrap();

        assert_eq!(report.purged, 6);
        assert_eq!(store.balance_count().unwrap(), 2);
        let top: Vec<Address> = store
            .top_balances(10)
            .unwrap()
            .into_iter()
            .map(|e| e.address)
            .collect();
        assert_eq!(top, vec![A, B]);
    }

    #[tokio::test]
    async fn test_empty_store_is_a_no_op() {
        let node = Arc::new(MockNodeClient::with_chain(3, vec![A], 1));
        let store = Arc::new(KvChainStore::in_memory());

        let report = job(&node, &store, RichListConfig::default()).run().await.unwrap();

        assert_eq!(report, RichListReport::default());
        assert_eq!(store.get_cursor(RICH_LIST_CURSOR).unwrap(), None);
    }
}
