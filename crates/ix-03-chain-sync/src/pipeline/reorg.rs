//! Backward reorg walk and repair.

use ix_01_node_client::NodeClient;
use ix_02_chain_store::ChainStore;
use shared_types::BlockHeight;
use tracing::{debug, error, info, warn};

use super::SyncPipeline;
use crate::config::SYNC_CURSOR;
use crate::domain::{RepairOutcome, SyncError};

impl<N, S> SyncPipeline<N, S>
where
    N: NodeClient + 'static,
    S: ChainStore + 'static,
{
    /// Delete local blocks the node no longer considers canonical.
    ///
    /// Walks down from `min(tip, local head)`. Heights missing locally are
    /// passed over, the first matching hash is the fork point, and every
    /// mismatch above it is stale. Nothing is deleted unless the fork point
    /// is found within `max_reorg_depth` stale blocks; the cursor is then
    /// rolled back to the fork point and deletions run highest first.
    pub(crate) async fn repair_reorg(
        &self,
        tip: BlockHeight,
        cursor: Option<BlockHeight>,
    ) -> Result<RepairOutcome, SyncError> {
        let Some(local_head) = self.store.latest_height()? else {
            return Ok(RepairOutcome::default());
        };
        let ahead_of_tip = (local_head > tip).then_some(local_head);
        if ahead_of_tip.is_some() {
            warn!(
                local_head,
                tip, "[ix-03] ⚠️ Local head is above the node tip; blocks above the tip are left alone"
            );
        }

        let top = local_head.min(tip);
        let limit = self.config.max_reorg_depth;
        let mut stale = Vec::new();
        let mut fork_point = None;
        let mut height = top;

        loop {
            if let Some(local) = self.store.get_block_by_height(height)? {
                let remote = self.node.get_block(height).await?;
                if remote.hash == local.hash {
                    fork_point = Some(height);
                    break;
                }
                debug!(
                    height,
                    local = ?local.hash,
                    remote = ?remote.hash,
                    "[ix-03] Stale block"
                );
                stale.push(height);
                if stale.len() as u64 > limit {
                    error!(
                        "[ix-03] ❌ No fork point within {} stale blocks below {}; refusing to repair",
                        limit, top
                    );
                    return Err(SyncError::ReorgTooDeep { from: top, limit });
                }
            }
            match height.checked_sub(1) {
                Some(next) => height = next,
                None => break,
            }
        }

        if stale.is_empty() {
            return Ok(RepairOutcome {
                fork_point,
                deleted: stale,
                ahead_of_tip,
            });
        }

        warn!(
            "[ix-03] 🔀 Reorg detected: {} stale blocks above {:?}",
            stale.len(),
            fork_point
        );
        // Roll back before deleting so a failed deletion cannot leave the
        // cursor above removed heights. Never move it forward here.
        match cursor.zip(fork_point).map(|(c, f)| c.min(f)) {
            Some(rollback) => {
                self.store.set_cursor(SYNC_CURSOR, rollback)?;
                ix_telemetry::SYNC_CURSOR_HEIGHT.set(rollback as i64);
                info!("[ix-03] ⏪ Cursor rolled back to {}", rollback);
            }
            None => {
                self.store.clear_cursor(SYNC_CURSOR)?;
                info!("[ix-03] ⏪ Cursor cleared; next pass starts from genesis");
            }
        }

        for &height in &stale {
            self.store
                .delete_block_and_transactions(height)
                .map_err(|source| {
                    error!(height, "[ix-03] ❌ Failed to delete stale block: {}", source);
                    SyncError::RepairFailed { height, source }
                })?;
            ix_telemetry::BLOCKS_REORGED.inc();
        }

        Ok(RepairOutcome {
            fork_point,
            deleted: stale,
            ahead_of_tip,
        })
    }
}
