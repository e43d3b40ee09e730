//! Run summaries and the cursor advancement rule.

use std::time::Duration;

use shared_types::BlockHeight;

/// Where the cursor goes after a forward pass.
///
/// - storage failed: leave it alone;
/// - every height in `start..=tip` landed: `tip`;
/// - otherwise one below the lowest height that did not land.
///
/// `None` means "do not write the cursor".
pub fn next_cursor(
    tip: BlockHeight,
    lowest_gap: Option<BlockHeight>,
    store_failed: bool,
) -> Option<BlockHeight> {
    if store_failed {
        return None;
    }
    match lowest_gap {
        None => Some(tip),
        Some(gap) => gap.checked_sub(1),
    }
}

/// Result of the backward reorg walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairOutcome {
    /// Highest height where local and remote agree.
    pub fork_point: Option<BlockHeight>,
    /// Stale heights deleted, highest first.
    pub deleted: Vec<BlockHeight>,
    /// Local head, when it is above the node tip. Blocks above the tip are
    /// kept until the node catches up.
    pub ahead_of_tip: Option<BlockHeight>,
}

impl RepairOutcome {
    pub fn repaired(&self) -> bool {
        !self.deleted.is_empty()
    }
}

/// Summary of one sync pass.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Node head at the start of the pass.
    pub tip: BlockHeight,
    /// First height fetched forward; `None` when already caught up.
    pub start: Option<BlockHeight>,
    pub repair: RepairOutcome,
    pub blocks_inserted: usize,
    pub blocks_replaced: usize,
    pub blocks_unchanged: usize,
    /// Unchanged blocks whose missing producer credit was written this pass.
    pub blocks_recredited: usize,
    pub blocks_skipped: usize,
    pub transactions_written: usize,
    pub transactions_unchanged: usize,
    pub transactions_skipped: usize,
    /// Heights whose block or transactions did not land, ascending.
    pub failed_heights: Vec<BlockHeight>,
    /// A shutdown request stopped the fetch workers early.
    pub interrupted: bool,
    /// A bulk write or aggregate flush failed.
    pub store_failed: bool,
    /// Cursor value after the pass, if it was written.
    pub cursor: Option<BlockHeight>,
    pub elapsed: Duration,
}

impl SyncReport {
    /// Blocks that went through the block batcher without being skipped.
    pub fn blocks_processed(&self) -> usize {
        self.blocks_inserted + self.blocks_replaced + self.blocks_unchanged
    }

    pub fn blocks_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.blocks_processed() as f64 / secs
        } else {
            0.0
        }
    }

    /// Every height up to `tip` is indexed and nothing is stored above it.
    pub fn is_complete(&self) -> bool {
        !self.store_failed
            && !self.interrupted
            && self.failed_heights.is_empty()
            && self.repair.ahead_of_tip.is_none()
    }
}

/// Summary of one rich-list pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichListReport {
    /// First height scanned.
    pub from: BlockHeight,
    /// Heights scanned.
    pub blocks_scanned: u64,
    /// Balances written.
    pub accounts_updated: usize,
    /// Addresses whose balance or stake could not be read.
    pub accounts_failed: usize,
    /// Balances removed by the purge.
    pub purged: usize,
    /// Next height the job will scan.
    pub cursor: BlockHeight,
}

/// Summary of one ENS sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnsSyncReport {
    /// Names stored when the pass started.
    pub total: usize,
    /// Names resolved against the node.
    pub checked: usize,
    /// Names whose address changed and was rewritten.
    pub updated: usize,
    /// Names the node could not resolve.
    pub failed: usize,
}
