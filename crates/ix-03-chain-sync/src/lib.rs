//! # Chain Sync (ix-03)
//!
//! Brings the chain store into agreement with the node, one pass at a time.
//!
//! ## Pass Outline
//!
//! ```text
//! tip + cursor ──→ reorg walk (delete stale, roll cursor back)
//!              ──→ fetch workers ──→ batchers ──→ producer aggregator
//!              ──→ advance cursor below the lowest gap
//! ```
//!
//! ## Guarantees
//!
//! | Guarantee | Description |
//! |-----------|-------------|
//! | Gap-free cursor | Every height at or below `last_block` is stored with all its transactions |
//! | Bounded repair | A reorg deeper than `max_reorg_depth` stale blocks aborts before deleting anything |
//! | Single runner | `RunLock` refuses a second concurrent pass over the same database |
//! | Re-runnable | A failed or interrupted pass is completed by running again |
//!
//! ## Crate Structure
//!
//! - `adapters/lock` - `fs2` run lock
//! - `domain/` - `SyncError`, reports, cursor rule, producer tally
//! - `pipeline/` - `SyncPipeline`: reorg repair and the concurrent stages
//! - `rich_list` - `RichListJob`
//! - `ens_sync` - `EnsSyncJob`
//! - `config` - `SyncConfig`, `RichListConfig`, `EnsSyncConfig`, cursor names

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ens_sync;
pub mod pipeline;
pub mod rich_list;

pub use adapters::{LockError, RunLock};
pub use config::{EnsSyncConfig, RichListConfig, SyncConfig, RICH_LIST_CURSOR, SYNC_CURSOR};
pub use domain::{EnsSyncReport, RepairOutcome, RichListReport, SyncError, SyncReport};
pub use ens_sync::EnsSyncJob;
pub use pipeline::SyncPipeline;
pub use rich_list::{RichListJob, SYSTEM_CONTRACT};
