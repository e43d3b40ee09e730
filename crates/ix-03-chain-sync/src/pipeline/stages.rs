//! # Pipeline Stages
//!
//! ```text
//! fetch workers ──blocks──→ block batcher ──committed──→ producer aggregator
//!       │                        │ (done)
//!       └──────hashes──→ tx fetcher ──records──→ tx batcher
//! ```
//!
//! Every queue closes when the last sender feeding it is dropped, so each
//! stage ends after draining its input.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use ix_01_node_client::NodeClient;
use ix_02_chain_store::{ChainStore, CommittedBlock, SkipReason};
use shared_types::{Block, BlockHeight, Hash, Timestamp, TransactionRecord, U256};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, warn};

use crate::domain::ProducerTally;

/// A transaction hash waiting for the transaction fetcher.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TxRef {
    pub hash: Hash,
    pub block_number: BlockHeight,
    pub block_timestamp: Timestamp,
}

/// Send on a bounded queue, warning when the send is about to block.
pub(crate) async fn send_or_choke<T>(queue: &mpsc::Sender<T>, name: &str, item: T) -> bool {
    if queue.capacity() == 0 {
        warn!(
            "[ix-03] 🐢 {} queue is choking ({} queued)",
            name,
            queue.max_capacity()
        );
    }
    queue.send(item).await.is_ok()
}

// =============================================================================
// BLOCK FETCH
// =============================================================================

/// The heights `start..=tip` with `height % workers == index`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Stride {
    pub index: usize,
    pub workers: usize,
    pub start: BlockHeight,
    pub tip: BlockHeight,
}

impl Stride {
    pub fn heights(self) -> impl Iterator<Item = BlockHeight> {
        let workers = self.workers as u64;
        let offset = (self.index as u64 + workers - self.start % workers) % workers;
        let first = self.start.checked_add(offset);
        let count = match first {
            Some(first) if first <= self.tip => (self.tip - first) / workers + 1,
            _ => 0,
        };
        let first = first.unwrap_or(0);
        (0..count).map(move |i| first + i * workers)
    }
}

#[derive(Debug, Default)]
pub(crate) struct FetchOutcome {
    pub fetched: u64,
    /// First height this worker did not deliver.
    pub stopped_at: Option<BlockHeight>,
    pub interrupted: bool,
}

/// Fetch every height of `stride` in increasing order.
///
/// A failed fetch ends the worker; the height is reported and not retried.
pub(crate) async fn fetch_blocks<N: NodeClient>(
    stride: Stride,
    node: Arc<N>,
    blocks: mpsc::Sender<Block>,
    hashes: mpsc::Sender<TxRef>,
    shutdown: Option<watch::Receiver<bool>>,
) -> FetchOutcome {
    let mut outcome = FetchOutcome::default();

    for height in stride.heights() {
        if shutdown.as_ref().map_or(false, |rx| *rx.borrow()) {
            debug!("[ix-03] Worker {} stopping at {} on shutdown", stride.index, height);
            outcome.stopped_at = Some(height);
            outcome.interrupted = true;
            break;
        }

        let block = match node.get_block(height).await {
            Ok(block) => block,
            Err(e) => {
                error!(
                    height,
                    transient = e.is_transient(),
                    "[ix-03] ❌ Worker {} failed to fetch block: {}",
                    stride.index,
                    e
                );
                outcome.stopped_at = Some(height);
                break;
            }
        };

        let refs: Vec<TxRef> = block
            .transactions
            .iter()
            .map(|hash| TxRef {
                hash: *hash,
                block_number: block.number,
                block_timestamp: block.timestamp,
            })
            .collect();

        if !send_or_choke(&blocks, "block", block).await {
            outcome.stopped_at = Some(height);
            break;
        }
        let mut delivered = true;
        for tx_ref in refs {
            if !send_or_choke(&hashes, "hash", tx_ref).await {
                delivered = false;
                break;
            }
        }
        if !delivered {
            outcome.stopped_at = Some(height);
            break;
        }
        outcome.fetched += 1;
    }

    debug!(
        "[ix-03] Worker {} done: {} blocks fetched",
        stride.index, outcome.fetched
    );
    outcome
}

// =============================================================================
// TRANSACTION FETCH
// =============================================================================

/// Resolve hashes into records stamped with their block's timestamp.
///
/// Returns the heights of blocks with at least one transaction that could
/// not be fetched.
pub(crate) async fn fetch_transactions<N: NodeClient>(
    node: Arc<N>,
    mut hashes: mpsc::Receiver<TxRef>,
    records: mpsc::Sender<TransactionRecord>,
) -> BTreeSet<BlockHeight> {
    let mut failed = BTreeSet::new();

    while let Some(tx_ref) = hashes.recv().await {
        match node
            .get_transaction_record(tx_ref.hash, tx_ref.block_timestamp)
            .await
        {
            Ok(record) => {
                if !send_or_choke(&records, "transaction", record).await {
                    failed.insert(tx_ref.block_number);
                }
            }
            Err(e) => {
                warn!(
                    hash = ?tx_ref.hash,
                    height = tx_ref.block_number,
                    "[ix-03] ⚠️ Failed to fetch transaction: {}",
                    e
                );
                failed.insert(tx_ref.block_number);
            }
        }
    }

    failed
}

// =============================================================================
// BATCHED INSERT
// =============================================================================

#[derive(Debug, Default)]
pub(crate) struct BlockBatchStats {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
    /// Unchanged blocks sent back to the aggregator for a missing credit.
    pub recredited: usize,
    pub skipped: usize,
    pub failed: BTreeSet<BlockHeight>,
    pub store_failed: bool,
}

/// Accumulate blocks and upsert them in bulk. Committed and uncredited rows
/// are forwarded to the producer aggregator; `done` fires once the last
/// batch is written.
pub(crate) async fn batch_blocks<S: ChainStore>(
    store: Arc<S>,
    batch_size: usize,
    mut blocks: mpsc::Receiver<Block>,
    committed: mpsc::Sender<CommittedBlock>,
    done: oneshot::Sender<()>,
) -> BlockBatchStats {
    let mut stats = BlockBatchStats::default();
    let mut batch = Vec::with_capacity(batch_size);

    while let Some(block) = blocks.recv().await {
        batch.push(block);
        if batch.len() >= batch_size {
            flush_blocks(&*store, &mut batch, &committed, &mut stats).await;
        }
    }
    if !batch.is_empty() {
        flush_blocks(&*store, &mut batch, &committed, &mut stats).await;
    }

    let _ = done.send(());
    stats
}

async fn flush_blocks<S: ChainStore>(
    store: &S,
    batch: &mut Vec<Block>,
    committed: &mpsc::Sender<CommittedBlock>,
    stats: &mut BlockBatchStats,
) {
    let rows = std::mem::take(batch);
    let outcome = match store.upsert_blocks(&rows) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("[ix-03] ❌ Block batch of {} failed: {}", rows.len(), e);
            stats.store_failed = true;
            stats.failed.extend(rows.iter().map(|b| b.number));
            return;
        }
    };

    stats.inserted += outcome.inserted();
    stats.replaced += outcome.replaced();
    stats.unchanged += outcome.unchanged;
    stats.recredited += outcome.uncredited.len();
    for (height, reason) in &outcome.skipped {
        if *reason == SkipReason::SupersededInBatch {
            continue;
        }
        warn!(height, %reason, "[ix-03] Block skipped");
        stats.skipped += 1;
        stats.failed.insert(*height);
    }
    ix_telemetry::BLOCKS_INDEXED.inc_by(outcome.committed.len() as u64);

    if !outcome.uncredited.is_empty() {
        warn!(
            "[ix-03] {} stored blocks were never credited; crediting them now",
            outcome.uncredited.len()
        );
    }
    for row in outcome.committed.into_iter().chain(outcome.uncredited) {
        if !send_or_choke(committed, "committed", row).await {
            error!("[ix-03] ❌ Producer aggregator is gone; credits lost");
            stats.store_failed = true;
            break;
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct TxBatchStats {
    pub written: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: BTreeSet<BlockHeight>,
    pub store_failed: bool,
}

/// Accumulate transaction records and upsert them in bulk.
///
/// Records whose block has not been written yet are parked and retried
/// with the next batch, and one last time after the block batcher is done.
pub(crate) async fn batch_transactions<S: ChainStore>(
    store: Arc<S>,
    batch_size: usize,
    mut records: mpsc::Receiver<TransactionRecord>,
    blocks_done: oneshot::Receiver<()>,
) -> TxBatchStats {
    let mut stats = TxBatchStats::default();
    let mut batch = Vec::with_capacity(batch_size);
    let mut parked = Vec::new();

    while let Some(record) = records.recv().await {
        batch.push(record);
        if batch.len() >= batch_size {
            flush_transactions(&*store, &mut batch, &mut parked, &mut stats);
        }
    }
    if !batch.is_empty() {
        flush_transactions(&*store, &mut batch, &mut parked, &mut stats);
    }

    let _ = blocks_done.await;
    if !parked.is_empty() {
        flush_transactions(&*store, &mut Vec::new(), &mut parked, &mut stats);
    }
    for record in parked {
        warn!(
            hash = ?record.tx.hash,
            height = record.tx.block_number,
            "[ix-03] Transaction dropped: its block was never stored"
        );
        stats.skipped += 1;
        stats.failed.insert(record.tx.block_number);
    }

    stats
}

fn flush_transactions<S: ChainStore>(
    store: &S,
    batch: &mut Vec<TransactionRecord>,
    parked: &mut Vec<TransactionRecord>,
    stats: &mut TxBatchStats,
) {
    let mut rows = std::mem::take(parked);
    rows.append(batch);

    let outcome = match store.upsert_transactions(&rows) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("[ix-03] ❌ Transaction batch of {} failed: {}", rows.len(), e);
            stats.store_failed = true;
            stats.failed.extend(rows.iter().map(|r| r.tx.block_number));
            return;
        }
    };

    stats.written += outcome.written;
    stats.unchanged += outcome.unchanged;
    ix_telemetry::TRANSACTIONS_INDEXED.inc_by(outcome.written as u64);

    let by_hash: HashMap<Hash, &TransactionRecord> = rows.iter().map(|r| (r.hash(), r)).collect();
    for (hash, reason) in outcome.skipped {
        let Some(record) = by_hash.get(&hash) else {
            continue;
        };
        match reason {
            SkipReason::SupersededInBatch => {}
            SkipReason::MissingBlock => parked.push((*record).clone()),
            reason => {
                warn!(?hash, %reason, "[ix-03] Transaction skipped");
                stats.skipped += 1;
                stats.failed.insert(record.tx.block_number);
            }
        }
    }
}

// =============================================================================
// PRODUCER AGGREGATION
// =============================================================================

#[derive(Debug, Default)]
pub(crate) struct AggregatorStats {
    pub flushes: usize,
    pub store_failed: bool,
}

/// Credit every committed block to its producer, flushing additive upserts
/// whenever `flush_size` producers are pending and once more at the end.
///
/// Each flush marks its blocks credited in the same write, so credits lost
/// to a failed flush are picked up by the block batcher on the next pass.
pub(crate) async fn aggregate_producers<S: ChainStore>(
    store: Arc<S>,
    flush_size: usize,
    reward_unit: U256,
    mut committed: mpsc::Receiver<CommittedBlock>,
) -> AggregatorStats {
    let mut stats = AggregatorStats::default();
    let mut tally = ProducerTally::new(reward_unit);

    while let Some(row) = committed.recv().await {
        tally.record(row.producer, row.height, row.hash);
        if tally.len() >= flush_size {
            flush_tally(&*store, &mut tally, &mut stats);
        }
    }
    if !tally.is_empty() {
        flush_tally(&*store, &mut tally, &mut stats);
    }
    if !tally.is_empty() {
        error!(
            "[ix-03] ❌ Credits for {} blocks could not be written",
            tally.pending_blocks()
        );
    }

    stats
}

fn flush_tally<S: ChainStore>(store: &S, tally: &mut ProducerTally, stats: &mut AggregatorStats) {
    for (producer, credit) in tally.drain() {
        if let Err(e) = store.credit_producer(producer, &credit.blocks, credit.rewards) {
            error!(?producer, "[ix-03] ❌ Producer aggregate flush failed: {}", e);
            stats.store_failed = true;
            tally.restore(producer, credit);
        }
    }
    stats.flushes += 1;
    ix_telemetry::PRODUCER_FLUSHES.inc();
}
