//! # Production Storage Adapters
//!
//! Enable the `rocksdb` feature to use the RocksDB engine:
//!
//! ```toml
//! indexer-runtime = { path = "...", features = ["rocksdb"] }
//! ```

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbConfig, RocksDbStore};

// Development and test engines live with the chain store.
pub use ix_02_chain_store::{FileBackedKVStore, InMemoryKVStore};
