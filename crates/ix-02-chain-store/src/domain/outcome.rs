//! Per-row results of batch upserts.

use std::fmt;

use shared_types::{Address, BlockHeight, Hash};

/// Why a single row of a batch was not written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The row carries an all-zero hash.
    ZeroHash,
    /// A later row in the same batch targets the same key.
    SupersededInBatch,
    /// The transaction is not yet included in a block.
    PendingTransaction,
    /// No block is stored at the transaction's height.
    MissingBlock,
    /// Another block is stored at the transaction's height.
    StaleBlock,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::ZeroHash => "zero hash",
            SkipReason::SupersededInBatch => "superseded in batch",
            SkipReason::PendingTransaction => "pending transaction",
            SkipReason::MissingBlock => "block not stored",
            SkipReason::StaleBlock => "stale block",
        };
        f.write_str(text)
    }
}

/// A block that changed the store and must be credited to its producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedBlock {
    pub height: BlockHeight,
    pub hash: Hash,
    pub producer: Address,
    /// A different block previously held this height and was removed.
    pub replaced: bool,
}

/// Result of `ChainStore::upsert_blocks`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockUpsertOutcome {
    /// Newly written blocks, including replacements.
    pub committed: Vec<CommittedBlock>,
    /// Rows identical to what was already stored.
    pub unchanged: usize,
    /// Unchanged rows whose producer was never credited for them.
    pub uncredited: Vec<CommittedBlock>,
    /// Rows rejected individually, with the reason.
    pub skipped: Vec<(BlockHeight, SkipReason)>,
}

impl BlockUpsertOutcome {
    pub fn inserted(&self) -> usize {
        self.committed.iter().filter(|c| !c.replaced).count()
    }

    pub fn replaced(&self) -> usize {
        self.committed.iter().filter(|c| c.replaced).count()
    }
}

/// Result of `ChainStore::upsert_transactions`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxUpsertOutcome {
    pub written: usize,
    pub unchanged: usize,
    pub skipped: Vec<(Hash, SkipReason)>,
}
