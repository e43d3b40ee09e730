//! # Commands
//!
//! One function per subcommand. Each takes the container and, where it
//! prints, the writer to print to.

use std::io::Write;

use ix_01_node_client::NodeClient;
use ix_02_chain_store::{ChainStore, StoreError};
use ix_03_chain_sync::{EnsSyncReport, RichListReport, RunLock, SyncError, SyncReport};
use ix_04_delegate_density::{DensityApi, DensityError, DensityLookup};
use shared_types::{Address, BlockHeight};
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

use crate::container::IndexerContainer;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Density(#[from] DensityError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// `fetchblocks`: one sync pass under the sync lock.
pub async fn fetch_blocks<N: NodeClient + 'static>(
    container: &IndexerContainer<N>,
    shutdown: watch::Receiver<bool>,
) -> Result<SyncReport, CommandError> {
    let _lock = RunLock::for_sync(&container.config.storage.db_name).map_err(SyncError::from)?;
    let report = container.sync_pipeline().with_shutdown(shutdown).run().await?;
    Ok(report)
}

/// `getblock`: print the block at `number`, or "not found".
///
/// Returns whether the block exists.
pub fn get_block<N>(
    container: &IndexerContainer<N>,
    number: BlockHeight,
    out: &mut impl Write,
) -> Result<bool, CommandError> {
    match container.store.get_block_by_height(number)? {
        Some(block) => {
            writeln!(out, "{}", serde_json::to_string_pretty(&block)?)?;
            Ok(true)
        }
        None => {
            writeln!(out, "not found")?;
            Ok(false)
        }
    }
}

/// `computerich`: one rich-list pass under the rich-list lock.
pub async fn compute_rich<N: NodeClient + 'static>(
    container: &IndexerContainer<N>,
) -> Result<RichListReport, CommandError> {
    let _lock =
        RunLock::for_rich_list(&container.config.storage.db_name).map_err(SyncError::from)?;
    let report = container.rich_list_job().run().await?;
    info!(
        "[runtime] 💰 Rich list: {} accounts updated, {} failed, {} purged",
        report.accounts_updated, report.accounts_failed, report.purged
    );
    Ok(report)
}

/// `enssync`: one name-registry refresh under the ENS lock.
pub async fn ens_sync<N: NodeClient + 'static>(
    container: &IndexerContainer<N>,
) -> Result<EnsSyncReport, CommandError> {
    let _lock =
        RunLock::for_ens_sync(&container.config.storage.db_name).map_err(SyncError::from)?;
    let report = container.ens_sync_job().run().await?;
    info!(
        "[runtime] 🏷️ ENS: {} of {} names checked, {} updated, {} failed",
        report.checked, report.total, report.updated, report.failed
    );
    Ok(report)
}

/// `delegates`: print the density report as JSON, or "not found" when the
/// address is outside the current rotation.
pub async fn delegates<N: NodeClient + 'static>(
    container: &IndexerContainer<N>,
    address: Option<Address>,
    out: &mut impl Write,
) -> Result<DensityLookup, CommandError> {
    let lookup = container.density_engine().delegate_density(address).await?;
    match &lookup {
        DensityLookup::Found(report) => {
            writeln!(out, "{}", serde_json::to_string_pretty(report)?)?;
        }
        DensityLookup::NotInRotation(_) => writeln!(out, "not found")?,
        DensityLookup::NoBlocks => writeln!(out, "no blocks indexed")?,
    }
    Ok(lookup)
}
