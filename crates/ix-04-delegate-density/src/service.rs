//! # Density Engine
//!
//! Reads the latest stored block, its rotation, the blocks of the longest
//! window and the node's live stake snapshot, then runs the pure walk in
//! [`compute_density`]. Never writes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use ix_01_node_client::{BlockTag, NodeClient};
use ix_02_chain_store::ChainStore;
use shared_types::{Address, Timestamp, TimestampCondition};
use tracing::{debug, info, warn};

use crate::config::DensityConfig;
use crate::domain::{compute_density, DensityError, DensityInput, DensityLookup};
use crate::ports::DensityApi;

pub struct DensityEngine<N, S> {
    node: Arc<N>,
    store: Arc<S>,
    config: DensityConfig,
}

impl<N, S> DensityEngine<N, S>
where
    N: NodeClient,
    S: ChainStore,
{
    pub fn new(node: Arc<N>, store: Arc<S>, config: DensityConfig) -> Self {
        Self {
            node,
            store,
            config,
        }
    }

    pub fn config(&self) -> &DensityConfig {
        &self.config
    }

    async fn lookup(&self, address: Option<Address>) -> Result<DensityLookup, DensityError> {
        let windows = self.config.normalized_windows()?;
        let longest = windows.last().copied().unwrap_or(0);

        let Some(height) = self.store.latest_height()? else {
            return Ok(DensityLookup::NoBlocks);
        };
        let Some(latest) = self.store.get_block_by_height(height)? else {
            return Ok(DensityLookup::NoBlocks);
        };
        if let Some(address) = address {
            if !latest.delegates.contains(&address) {
                return Ok(DensityLookup::NotInRotation(address));
            }
        }

        let stakes: HashMap<Address, u64> = self
            .node
            .get_delegate_votes(BlockTag::Number(height))
            .await?
            .into_iter()
            .map(|vote| (vote.address, vote.stake))
            .collect();

        let since = latest.timestamp.saturating_sub(longest);
        let produced: HashMap<Timestamp, Address> = self
            .store
            .get_blocks_by_timestamp(TimestampCondition::AtOrAfter(since), address, None)?
            .into_iter()
            .map(|block| (block.timestamp, block.producer))
            .collect();
        debug!(
            height,
            blocks = produced.len(),
            "[ix-04] Loaded blocks since {}",
            since
        );

        let input = DensityInput {
            delegates: &latest.delegates,
            produced: &produced,
            latest_timestamp: latest.timestamp,
            stakes: &stakes,
            filter: address,
        };
        Ok(DensityLookup::Found(compute_density(
            &input,
            &windows,
            &self.config.dpos,
        )))
    }
}

#[async_trait]
impl<N, S> DensityApi for DensityEngine<N, S>
where
    N: NodeClient,
    S: ChainStore,
{
    async fn delegate_density(
        &self,
        address: Option<Address>,
    ) -> Result<DensityLookup, DensityError> {
        let started = Instant::now();
        let result = self.lookup(address).await;

        let outcome = match &result {
            Ok(DensityLookup::Found(report)) => {
                info!(
                    "[ix-04] 📊 Density over {}s: {} delegates, {} missed blocks ({:.3}s)",
                    report.total_seconds_examined,
                    report.delegates.len(),
                    report.total_missed_blocks,
                    started.elapsed().as_secs_f64()
                );
                "found"
            }
            Ok(DensityLookup::NotInRotation(address)) => {
                info!(?address, "[ix-04] Address is not in the current rotation");
                "not_in_rotation"
            }
            Ok(DensityLookup::NoBlocks) => {
                warn!("[ix-04] ⚠️ No blocks indexed; run a sync first");
                "no_blocks"
            }
            Err(e) => {
                warn!("[ix-04] ❌ Density query failed: {}", e);
                "error"
            }
        };
        ix_telemetry::DENSITY_QUERIES
            .with_label_values(&[outcome])
            .inc();

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ix_01_node_client::MockNodeClient;
    use ix_02_chain_store::{InMemoryKVStore, KvChainStore};
    use shared_types::{Block, H160};

    use crate::config::DposConfig;

    type Store = KvChainStore<InMemoryKVStore>;

    const A: Address = H160([0xa1; 20]);
    const B: Address = H160([0xb2; 20]);
    const OUTSIDER: Address = H160([0xee; 20]);
    const BASE: Timestamp = 1_600_000_000;

    /// Scheduled A A B B A A; slot 2 signed by A, slot 3 never produced.
    fn scenario_store() -> Arc<Store> {
        let store = KvChainStore::in_memory();
        let blocks: Vec<Block> = [(0, A), (1, A), (2, A), (4, A), (5, A)]
            .into_iter()
            .enumerate()
            .map(|(number, (slot, producer))| {
                Block {
                    number: number as u64,
                    timestamp: BASE + slot,
                    producer,
                    delegates: vec![A, B],
                    signature: vec![slot as u8],
                    ..Default::default()
                }
                .seal()
            })
            .collect();
        store.upsert_blocks(&blocks).unwrap();
        Arc::new(store)
    }

    fn engine(store: Arc<Store>, windows: Vec<u64>) -> DensityEngine<MockNodeClient, Store> {
        // Stakes: A = 1000, B = 2000.
        let node = Arc::new(MockNodeClient::with_chain(1, vec![A, B], 0));
        let config = DensityConfig {
            windows,
            dpos: DposConfig {
                period: 1,
                turn_block_count: 2,
                delegate_count: 2,
            },
        };
        DensityEngine::new(node, store, config)
    }

    #[tokio::test]
    async fn test_scenario_report() {
        let engine = engine(scenario_store(), vec![6]);

        let DensityLookup::Found(report) = engine.delegate_density(None).await.unwrap() else {
            panic!("expected a report");
        };

        assert_eq!(report.total_seconds_examined, 6);
        assert_eq!(report.total_missed_blocks, 2);
        let order: Vec<Address> = report.delegates.iter().map(|r| r[0].address).collect();
        assert_eq!(order, vec![A, B]);

        let a = &report.stats_for(&A).unwrap()[0];
        assert_eq!((a.total_blocks, a.missed_blocks, a.stake), (4, 0, 1_000));
        let b = &report.stats_for(&B).unwrap()[0];
        assert_eq!((b.total_blocks, b.missed_blocks, b.stake), (2, 2, 2_000));
        assert_eq!(b.density, 0.0);
    }

    #[tokio::test]
    async fn test_filtered_report() {
        let engine = engine(scenario_store(), vec![6, 2]);

        let DensityLookup::Found(report) = engine.delegate_density(Some(A)).await.unwrap() else {
            panic!("expected a report");
        };

        assert_eq!(report.address, Some(A));
        let a = report.stats_for(&A).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!((a[0].seconds_examined, a[0].total_blocks), (2, 2));
        assert_eq!((a[1].seconds_examined, a[1].total_blocks), (6, 4));
        assert_eq!(report.total_missed_blocks, 0);
    }

    #[tokio::test]
    async fn test_address_outside_rotation_is_not_found() {
        let engine = engine(scenario_store(), vec![6]);

        let lookup = engine.delegate_density(Some(OUTSIDER)).await.unwrap();

        assert_eq!(lookup, DensityLookup::NotInRotation(OUTSIDER));
    }

    #[tokio::test]
    async fn test_empty_store_reports_no_blocks() {
        let engine = engine(Arc::new(KvChainStore::in_memory()), vec![6]);

        assert_eq!(
            engine.delegate_density(None).await.unwrap(),
            DensityLookup::NoBlocks
        );
    }

    #[tokio::test]
    async fn test_invalid_windows_rejected() {
        let engine = engine(scenario_store(), vec![]);

        assert!(matches!(
            engine.delegate_density(None).await,
            Err(DensityError::InvalidWindows(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_stake_reports_zero() {
        let store = scenario_store();
        let node = Arc::new(MockNodeClient::with_chain(1, vec![B], 0));
        let engine = DensityEngine::new(
            node,
            store,
            DensityConfig {
                windows: vec![6],
                dpos: DposConfig {
                    period: 1,
                    turn_block_count: 2,
                    delegate_count: 2,
                },
            },
        );

        let DensityLookup::Found(report) = engine.delegate_density(None).await.unwrap() else {
            panic!("expected a report");
        };

        assert_eq!(report.stats_for(&A).unwrap()[0].stake, 0);
        assert_eq!(report.stats_for(&B).unwrap()[0].stake, 1_000);
    }
}
