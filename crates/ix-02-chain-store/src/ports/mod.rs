//! Ports layer: the store API (inbound) and the key-value engine it needs (outbound).

pub mod inbound;
pub mod outbound;

pub use inbound::ChainStore;
pub use outbound::{BatchOperation, FileBackedKVStore, InMemoryKVStore, KeyValueStore};
