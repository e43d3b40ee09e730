//! # Indexer Container
//!
//! Builds every long-lived component once at start-up and hands out
//! references; no component reaches for global state.

pub mod config;
pub mod subsystems;

pub use config::{ConfigError, IndexerConfig, StorageConfig, StoreBackend};
pub use subsystems::{open_store, ContainerError, IndexerContainer, IndexerStore};
