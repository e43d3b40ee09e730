//! # ENS Sync
//!
//! Batch job over the stored name registry: every name is resolved again
//! against the node's resolver contract, and entries whose address moved
//! are rewritten.

use std::sync::Arc;
use std::time::Instant;

use ix_01_node_client::NodeClient;
use ix_02_chain_store::ChainStore;
use shared_types::Hash;
use tracing::{debug, info, warn};

use crate::config::EnsSyncConfig;
use crate::domain::{EnsSyncReport, SyncError};

pub struct EnsSyncJob<N, S> {
    node: Arc<N>,
    store: Arc<S>,
    config: EnsSyncConfig,
}

impl<N, S> EnsSyncJob<N, S>
where
    N: NodeClient,
    S: ChainStore,
{
    pub fn new(node: Arc<N>, store: Arc<S>, config: EnsSyncConfig) -> Self {
        Self {
            node,
            store,
            config,
        }
    }

    /// Resolve every stored name once, in chunks of `chunk_size`.
    ///
    /// Per-name node failures are logged and counted, never fatal.
    ///
    /// # Errors
    ///
    /// `MissingSetting` without a resolver contract; store failures.
    pub async fn run(&self) -> Result<EnsSyncReport, SyncError> {
        let contract = self
            .config
            .contract
            .filter(|contract| !contract.is_zero())
            .ok_or(SyncError::MissingSetting("ens.contract"))?;

        let started = Instant::now();
        let mut report = EnsSyncReport {
            total: self.store.ens_count()?,
            ..Default::default()
        };
        if report.total == 0 {
            info!("[ix-03] 🏷️ No names to refresh");
            return Ok(report);
        }
        info!("[ix-03] 🏷️ Refreshing {} names", report.total);

        let chunk_size = self.config.chunk_size.max(1);
        let mut after: Option<Hash> = None;
        loop {
            let entries = self.store.ens_entries_after(after.as_ref(), chunk_size)?;
            let Some(last) = entries.last() else {
                break;
            };
            after = Some(last.hash);
            let full = entries.len() == chunk_size;

            for mut entry in entries {
                report.checked += 1;
                let address = match self.node.ens_address(contract, entry.hash).await {
                    Ok(address) => address,
                    Err(e) => {
                        warn!(name = %entry.name, "[ix-03] ⚠️ Name lookup failed: {}", e);
                        report.failed += 1;
                        continue;
                    }
                };
                if address == entry.address {
                    continue;
                }
                debug!(
                    name = %entry.name,
                    old = ?entry.address,
                    new = ?address,
                    "[ix-03] Name moved"
                );
                entry.address = address;
                self.store.upsert_ens_entry(&entry)?;
                report.updated += 1;
            }

            if !full {
                break;
            }
        }
        ix_telemetry::ENS_UPDATES.inc_by(report.updated as u64);

        info!(
            "[ix-03] 🏷️ Updated {} of {} names in {:.3}s ({} failed)",
            report.updated,
            report.total,
            started.elapsed().as_secs_f64(),
            report.failed
        );
        Ok(report)
    }
}
