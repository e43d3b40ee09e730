//! # Subsystem Container
//!
//! ```text
//! IndexerConfig ──→ NodeClient (ix-01) ──┐
//!               └─→ ChainStore (ix-02) ──┼──→ SyncPipeline / RichListJob / EnsSyncJob (ix-03)
//!                                        └──→ DensityEngine (ix-04)
//! ```
//!
//! Node and store are shared through `Arc`; each command builds the
//! subsystem it needs on demand.

use std::sync::Arc;

use ix_01_node_client::{NodeClient, NodeError, RpcNodeClient};
use ix_02_chain_store::{
    FileBackedKVStore, InMemoryKVStore, KVStoreError, KeyValueStore, KvChainStore,
};
use ix_03_chain_sync::{EnsSyncJob, RichListJob, SyncPipeline};
use ix_04_delegate_density::DensityEngine;
use shared_types::U256;
use thiserror::Error;
use tracing::info;

use crate::container::config::{ConfigError, IndexerConfig, StorageConfig, StoreBackend};

/// Chain store over whichever engine the configuration selects.
pub type IndexerStore = KvChainStore<Box<dyn KeyValueStore>>;

/// Start-up failures.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to open store: {0}")]
    Store(#[from] KVStoreError),

    #[error("Failed to create node client: {0}")]
    Node(#[from] NodeError),
}

/// Open the configured key-value engine and wrap it in a chain store.
pub fn open_store(
    storage: &StorageConfig,
    reward_unit: U256,
) -> Result<IndexerStore, ContainerError> {
    let engine: Box<dyn KeyValueStore> = match storage.backend {
        StoreBackend::Memory => Box::new(InMemoryKVStore::new()),
        StoreBackend::File => {
            std::fs::create_dir_all(&storage.data_dir).map_err(KVStoreError::from)?;
            Box::new(FileBackedKVStore::open(storage.snapshot_path())?)
        }
        #[cfg(feature = "rocksdb")]
        StoreBackend::RocksDb => {
            std::fs::create_dir_all(&storage.data_dir).map_err(KVStoreError::from)?;
            Box::new(crate::adapters::storage::RocksDbStore::open_default(
                storage.rocksdb_path(),
            )?)
        }
        #[cfg(not(feature = "rocksdb"))]
        StoreBackend::RocksDb => {
            return Err(ConfigError::Invalid(
                "built without the `rocksdb` feature".to_string(),
            )
            .into())
        }
    };
    info!(
        "[runtime] Store '{}' opened ({:?} backend)",
        storage.db_name, storage.backend
    );
    Ok(KvChainStore::new(engine).with_reward_unit(reward_unit))
}

/// Central container holding the node client, the store and the config.
pub struct IndexerContainer<N = RpcNodeClient> {
    pub config: IndexerConfig,
    pub node: Arc<N>,
    pub store: Arc<IndexerStore>,
}

impl IndexerContainer<RpcNodeClient> {
    /// Connect to the configured node and open the configured store.
    pub fn connect(config: IndexerConfig) -> Result<Self, ContainerError> {
        config.validate()?;
        let node = RpcNodeClient::connect(&config.node)?;
        let store = open_store(&config.storage, config.sync.reward_unit())?;
        Ok(Self {
            config,
            node: Arc::new(node),
            store: Arc::new(store),
        })
    }
}

impl<N: NodeClient + 'static> IndexerContainer<N> {
    /// Container around an existing node client.
    pub fn with_node(config: IndexerConfig, node: Arc<N>) -> Result<Self, ContainerError> {
        config.validate()?;
        let store = open_store(&config.storage, config.sync.reward_unit())?;
        Ok(Self {
            config,
            node,
            store: Arc::new(store),
        })
    }

    pub fn sync_pipeline(&self) -> SyncPipeline<N, IndexerStore> {
        SyncPipeline::new(
            self.node.clone(),
            self.store.clone(),
            self.config.sync.clone(),
        )
    }

    pub fn rich_list_job(&self) -> RichListJob<N, IndexerStore> {
        RichListJob::new(
            self.node.clone(),
            self.store.clone(),
            self.config.rich_list.clone(),
        )
    }

    pub fn ens_sync_job(&self) -> EnsSyncJob<N, IndexerStore> {
        EnsSyncJob::new(
            self.node.clone(),
            self.store.clone(),
            self.config.ens.clone(),
        )
    }

    pub fn density_engine(&self) -> DensityEngine<N, IndexerStore> {
        DensityEngine::new(
            self.node.clone(),
            self.store.clone(),
            self.config.density.clone(),
        )
    }
}
