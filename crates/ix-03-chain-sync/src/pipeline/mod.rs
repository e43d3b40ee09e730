//! # Sync Pipeline
//!
//! One pass brings the local store into agreement with the node:
//!
//! 1. Walk backward from the shared head, deleting stale local blocks until
//!    the first height whose hash matches the node (the fork point).
//! 2. Fetch `cursor+1..=tip` forward through the concurrent stages in
//!    [`stages`].
//! 3. Advance the cursor as far as every height landed.

mod reorg;
mod stages;
#[cfg(test)]
mod tests;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use ix_01_node_client::NodeClient;
use ix_02_chain_store::ChainStore;
use shared_types::BlockHeight;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{SyncConfig, SYNC_CURSOR};
use crate::domain::{next_cursor, SyncError, SyncReport};
use stages::Stride;

/// Parallel fetch / batched insert pipeline.
pub struct SyncPipeline<N, S> {
    node: Arc<N>,
    store: Arc<S>,
    config: SyncConfig,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<N, S> SyncPipeline<N, S>
where
    N: NodeClient + 'static,
    S: ChainStore + 'static,
{
    pub fn new(node: Arc<N>, store: Arc<S>, config: SyncConfig) -> Self {
        Self {
            node,
            store,
            config,
            shutdown: None,
        }
    }

    /// Stop handing out new heights once `shutdown` turns `true`.
    /// Already fetched data is still written.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one sync pass.
    ///
    /// # Errors
    ///
    /// Node or store failures before the forward stages start, a reorg
    /// deeper than `max_reorg_depth`, or a failed stale-block deletion. In
    /// every error case the cursor is left where it was.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let tip = self.node.tip_height().await?;
        let cursor = self.store.get_cursor(SYNC_CURSOR)?;
        info!(tip, cursor = ?cursor, "[ix-03] 🔄 Starting sync pass");

        let repair = self.repair_reorg(tip, cursor).await?;
        let cursor = if repair.repaired() {
            self.store.get_cursor(SYNC_CURSOR)?
        } else {
            cursor
        };
        let start = cursor.map_or(0, |c| c.saturating_add(1));

        let mut report = SyncReport {
            tip,
            repair,
            ..Default::default()
        };

        if start > tip {
            report.cursor = cursor;
            report.elapsed = started.elapsed();
            match report.repair.ahead_of_tip {
                Some(local_head) => warn!(
                    local_head,
                    tip, "[ix-03] ⚠️ Waiting for the node to reach the local head"
                ),
                None => info!("[ix-03] ✅ Already at tip {}", tip),
            }
            return Ok(report);
        }

        report.start = Some(start);
        self.run_forward(start, tip, &mut report).await?;

        report.cursor = match next_cursor(tip, report.failed_heights.first().copied(), report.store_failed) {
            Some(height) => {
                self.store.set_cursor(SYNC_CURSOR, height)?;
                ix_telemetry::SYNC_CURSOR_HEIGHT.set(height as i64);
                Some(height)
            }
            None => cursor,
        };
        report.elapsed = started.elapsed();

        info!(
            "[ix-03] Processed {} blocks in {:.3}s ({:.0} bps)",
            report.blocks_processed(),
            report.elapsed.as_secs_f64(),
            report.blocks_per_second()
        );
        if !report.is_complete() {
            warn!(
                failed = report.failed_heights.len(),
                ahead_of_tip = ?report.repair.ahead_of_tip,
                interrupted = report.interrupted,
                store_failed = report.store_failed,
                cursor = ?report.cursor,
                "[ix-03] ⚠️ Sync pass incomplete; re-run to fill the gaps"
            );
        }
        Ok(report)
    }

    async fn run_forward(
        &self,
        start: BlockHeight,
        tip: BlockHeight,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let capacity = self.config.queue_capacity.max(1);
        let (block_tx, block_rx) = mpsc::channel(capacity);
        let (hash_tx, hash_rx) = mpsc::channel(capacity);
        let (record_tx, record_rx) = mpsc::channel(capacity);
        let (committed_tx, committed_rx) = mpsc::channel(capacity);
        let (done_tx, done_rx) = oneshot::channel();

        let workers = self.config.workers.max(1);
        info!(
            "[ix-03] ⬇️ Fetching blocks {}..={} with {} workers",
            start, tip, workers
        );

        let fetchers: Vec<_> = (0..workers)
            .map(|index| {
                let stride = Stride {
                    index,
                    workers,
                    start,
                    tip,
                };
                tokio::spawn(stages::fetch_blocks(
                    stride,
                    self.node.clone(),
                    block_tx.clone(),
                    hash_tx.clone(),
                    self.shutdown.clone(),
                ))
            })
            .collect();
        // The block and hash queues close when the last worker finishes.
        drop(block_tx);
        drop(hash_tx);

        let tx_fetcher = tokio::spawn(stages::fetch_transactions(
            self.node.clone(),
            hash_rx,
            record_tx,
        ));
        let block_batcher = tokio::spawn(stages::batch_blocks(
            self.store.clone(),
            self.config.block_batch_size.max(1),
            block_rx,
            committed_tx,
            done_tx,
        ));
        let tx_batcher = tokio::spawn(stages::batch_transactions(
            self.store.clone(),
            self.config.tx_batch_size.max(1),
            record_rx,
            done_rx,
        ));
        let aggregator = tokio::spawn(stages::aggregate_producers(
            self.store.clone(),
            self.config.producer_flush_size.max(1),
            self.config.reward_unit(),
            committed_rx,
        ));

        let mut gaps = BTreeSet::new();
        for fetcher in fetchers {
            let outcome = join("block fetch", fetcher).await?;
            gaps.extend(outcome.stopped_at);
            report.interrupted |= outcome.interrupted;
        }
        gaps.extend(join("transaction fetch", tx_fetcher).await?);

        let blocks = join("block batcher", block_batcher).await?;
        report.blocks_inserted = blocks.inserted;
        report.blocks_replaced = blocks.replaced;
        report.blocks_unchanged = blocks.unchanged;
        report.blocks_recredited = blocks.recredited;
        report.blocks_skipped = blocks.skipped;
        gaps.extend(blocks.failed);

        let txs = join("transaction batcher", tx_batcher).await?;
        report.transactions_written = txs.written;
        report.transactions_unchanged = txs.unchanged;
        report.transactions_skipped = txs.skipped;
        gaps.extend(txs.failed);

        let producers = join("producer aggregator", aggregator).await?;

        report.store_failed = blocks.store_failed || txs.store_failed || producers.store_failed;
        report.failed_heights = gaps.into_iter().collect();
        Ok(())
    }
}

async fn join<T>(stage: &'static str, handle: JoinHandle<T>) -> Result<T, SyncError> {
    handle.await.map_err(|e| SyncError::Stage {
        stage,
        message: e.to_string(),
    })
}
