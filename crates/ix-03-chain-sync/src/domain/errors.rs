//! # Chain Sync Errors

use ix_01_node_client::NodeError;
use ix_02_chain_store::StoreError;
use shared_types::BlockHeight;
use thiserror::Error;

use crate::adapters::lock::LockError;

/// Errors that end a sync or rich-list run.
///
/// Per-row and per-height failures inside a run are not errors: they are
/// logged, counted in the report and hold the cursor back.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The node could not be reached or answered with an error.
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    /// The chain store failed outside of a batch.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The backward walk found more stale blocks than allowed.
    #[error("Reorg deeper than {limit} blocks (walk started at {from})")]
    ReorgTooDeep { from: BlockHeight, limit: u64 },

    /// A stale block could not be deleted.
    #[error("Reorg repair failed at height {height}: {source}")]
    RepairFailed {
        height: BlockHeight,
        #[source]
        source: StoreError,
    },

    /// A job was started without a setting it cannot run without.
    #[error("Missing setting: {0}")]
    MissingSetting(&'static str),

    /// Another run holds the lock.
    #[error("{0}")]
    Lock(#[from] LockError),

    /// A pipeline stage panicked or was cancelled.
    #[error("Pipeline stage {stage} failed: {message}")]
    Stage { stage: &'static str, message: String },
}

impl SyncError {
    /// Re-running may succeed without operator action.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Node(e) => e.is_transient(),
            SyncError::Store(e) => e.is_transient(),
            SyncError::Lock(_) => true,
            _ => false,
        }
    }

    /// Local and remote history disagree in a way the run refused to guess about.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            SyncError::ReorgTooDeep { .. } | SyncError::RepairFailed { .. }
        )
    }
}
