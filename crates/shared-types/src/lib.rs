//! # Shared Types Crate
//!
//! Chain entities shared by every indexer subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: blocks, transactions and bookkeeping rows are
//!   defined once here and flow unchanged from the node client into the store.
//! - **Immutable snapshots**: a `Block` is never mutated after it leaves the
//!   node client; reorg repair deletes and re-inserts instead.

pub mod encoding;
pub mod entities;

pub use entities::*;
