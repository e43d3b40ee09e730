//! # Chain Store Service
//!
//! `KvChainStore` implements `ChainStore` over any ordered `KeyValueStore`.
//!
//! Reads take a shared lock on the engine; every write takes the exclusive
//! lock, plans its mutations as one `BatchOperation` list and commits it with
//! a single `atomic_batch_write`, so readers never observe half a batch.

mod helpers;
mod storage;

use parking_lot::RwLock;
use shared_types::{U256, DEFAULT_BLOCK_REWARD_WEI};

use crate::ports::outbound::{InMemoryKVStore, KeyValueStore};

/// Chain store backed by a key-value engine.
pub struct KvChainStore<KV: KeyValueStore> {
    /// Underlying engine.
    pub(crate) kv_store: RwLock<KV>,
    /// Reward removed from a producer aggregate per deleted block.
    pub(crate) reward_unit: U256,
}

impl<KV: KeyValueStore> KvChainStore<KV> {
    pub fn new(kv_store: KV) -> Self {
        Self {
            kv_store: RwLock::new(kv_store),
            reward_unit: DEFAULT_BLOCK_REWARD_WEI,
        }
    }

    /// Override the per-block reward used for guarded decrements.
    pub fn with_reward_unit(mut self, reward_unit: U256) -> Self {
        self.reward_unit = reward_unit;
        self
    }

    pub fn reward_unit(&self) -> U256 {
        self.reward_unit
    }
}

impl KvChainStore<InMemoryKVStore> {
    /// Store over a fresh in-memory engine.
    pub fn in_memory() -> Self {
        Self::new(InMemoryKVStore::new())
    }
}
