//! Domain layer: key layout, upsert outcomes, errors.

pub mod errors;
pub mod keys;
pub mod outcome;

pub use errors::{KVStoreError, StoreError};
pub use outcome::{BlockUpsertOutcome, CommittedBlock, SkipReason, TxUpsertOutcome};
