//! # Chain Store (ix-02)
//!
//! Durable storage for indexed blocks, transactions, producer aggregates,
//! rich-list balances, registered names and named sync cursors.
//!
//! ## Guarantees
//!
//! | Guarantee | Description |
//! |-----------|-------------|
//! | Idempotent upsert | Re-writing an identical block or transaction changes nothing |
//! | Atomic batches | A batch upsert or a block deletion commits entirely or not at all |
//! | Row isolation | One bad row is skipped and reported; the rest of the batch commits |
//! | Canonical transactions | A transaction is only stored while its block is the stored block at that height |
//! | Non-negative aggregates | A decrement the aggregate cannot absorb is refused and logged |
//! | Credit tracking | A stored block whose producer credit never landed is reported on re-upsert |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - key layout, upsert outcomes, errors
//! - `ports/` - `ChainStore` (inbound) and `KeyValueStore` (outbound)
//! - `service/` - `KvChainStore`, the `ChainStore` implementation
//!
//! ## Usage
//!
//! ```ignore
//! use ix_02_chain_store::{ChainStore, KvChainStore};
//!
//! let store = KvChainStore::in_memory();
//! let outcome = store.upsert_blocks(&blocks)?;
//! for committed in outcome.committed.iter().chain(&outcome.uncredited) {
//!     store.credit_producer(
//!         committed.producer,
//!         &[(committed.height, committed.hash)],
//!         store.reward_unit(),
//!     )?;
//! }
//! ```

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{
    BlockUpsertOutcome, CommittedBlock, KVStoreError, SkipReason, StoreError, TxUpsertOutcome,
};
pub use ports::{BatchOperation, ChainStore, FileBackedKVStore, InMemoryKVStore, KeyValueStore};
pub use service::KvChainStore;
