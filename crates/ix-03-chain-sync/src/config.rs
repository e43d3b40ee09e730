//! # Chain Sync Configuration

use serde::{Deserialize, Serialize};
use shared_types::{Address, U256, WEI_PER_BALANCE_UNIT};

/// Cursor holding the highest fully committed height.
pub const SYNC_CURSOR: &str = "last_block";

/// Cursor holding the next height the rich-list job will scan.
pub const RICH_LIST_CURSOR: &str = "rich_list_last_block";

/// Sync pipeline configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Block fetch workers. Heights are striped across them by `height % workers`.
    pub workers: usize,

    /// Capacity of the block, hash, record and committed-block queues.
    pub queue_capacity: usize,

    /// Blocks per bulk upsert.
    pub block_batch_size: usize,

    /// Transactions per bulk upsert.
    pub tx_batch_size: usize,

    /// Distinct producers buffered before the aggregator flushes.
    pub producer_flush_size: usize,

    /// Stale blocks the backward walk may find before giving up.
    pub max_reorg_depth: u64,

    /// Producer reward per block, in units of 10^-4 of the native token.
    pub block_reward_units: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            queue_capacity: 512,
            block_batch_size: 400,
            tx_batch_size: 20,
            producer_flush_size: 50,
            max_reorg_depth: 1024,
            block_reward_units: 3171,
        }
    }
}

impl SyncConfig {
    /// Small batches and a few workers, so tests exercise every flush path.
    pub fn for_testing() -> Self {
        Self {
            workers: 3,
            queue_capacity: 4,
            block_batch_size: 5,
            tx_batch_size: 3,
            producer_flush_size: 2,
            ..Self::default()
        }
    }

    /// Block reward in wei.
    pub fn reward_unit(&self) -> U256 {
        U256::from(self.block_reward_units) * U256::from(WEI_PER_BALANCE_UNIT)
    }
}

/// Rich-list job configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RichListConfig {
    /// Balances kept after purging.
    pub size: usize,

    /// Distinct addresses queried per run.
    pub max_accounts: usize,

    /// Blocks scanned per run.
    pub max_blocks: u64,
}

impl Default for RichListConfig {
    fn default() -> Self {
        Self {
            size: 1_000,
            max_accounts: 1_000_000,
            max_blocks: 500_000,
        }
    }
}

/// ENS sync job configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsSyncConfig {
    /// Name resolver contract. The job refuses to run without one.
    pub contract: Option<Address>,

    /// Names read from the store per chunk.
    pub chunk_size: usize,
}

impl Default for EnsSyncConfig {
    fn default() -> Self {
        Self {
            contract: None,
            chunk_size: 100,
        }
    }
}
