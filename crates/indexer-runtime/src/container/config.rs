//! # Indexer Configuration
//!
//! Unified configuration for every subsystem.
//!
//! ## Precedence
//!
//! 1. Defaults (`IndexerConfig::default()`)
//! 2. Optional TOML file (`--config`)
//! 3. `IX_*` environment variables
//! 4. Command-line flags
//!
//! ```toml
//! [node]
//! endpoint = "~/.ebakus/ebakus.ipc"
//!
//! [storage]
//! backend = "rocksdb"
//! data_dir = "/var/lib/ix"
//!
//! [sync]
//! workers = 16
//!
//! [ens]
//! contract = "0x0000000000000000000000000000000000000101"
//! ```

use std::path::{Path, PathBuf};

use ix_01_node_client::NodeClientConfig;
use ix_03_chain_sync::{EnsSyncConfig, RichListConfig, SyncConfig};
use ix_04_delegate_density::DensityConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Complete indexer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub node: NodeClientConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub rich_list: RichListConfig,
    pub density: DensityConfig,
    pub ens: EnsSyncConfig,
}

/// Key-value engine behind the chain store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    File,
    #[value(name = "rocksdb")]
    #[serde(rename = "rocksdb")]
    RocksDb,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "file" => Ok(StoreBackend::File),
            "rocksdb" => Ok(StoreBackend::RocksDb),
            other => Err(ConfigError::Invalid(format!(
                "unknown storage backend '{}'",
                other
            ))),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the database.
    pub data_dir: PathBuf,
    /// Database name; also names the run locks.
    pub db_name: String,
    pub backend: StoreBackend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            db_name: "chain".to_string(),
            backend: StoreBackend::default(),
        }
    }
}

impl StorageConfig {
    /// Snapshot file of the `file` backend.
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.snapshot", self.db_name))
    }

    /// Database directory of the `rocksdb` backend.
    pub fn rocksdb_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_name)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for {var}")]
    Env { var: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl IndexerConfig {
    /// Defaults, overlaid with the TOML file at `path` if one is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&text)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `IX_*` overrides from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_from(|var| std::env::var(var).ok())
    }

    /// Apply `IX_*` overrides read through `lookup`.
    pub fn with_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(endpoint) = lookup("IX_NODE_ENDPOINT") {
            self.node.endpoint = endpoint;
        }
        if let Some(dir) = lookup("IX_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup("IX_DB_NAME") {
            self.storage.db_name = name;
        }
        if let Some(backend) = lookup("IX_BACKEND") {
            self.storage.backend = backend.parse().map_err(|_| ConfigError::Env {
                var: "IX_BACKEND",
                value: backend,
            })?;
        }
        override_number(&lookup, "IX_THREADS", &mut self.sync.workers)?;
        override_number(&lookup, "IX_QUEUE_CAPACITY", &mut self.sync.queue_capacity)?;
        override_number(&lookup, "IX_BLOCK_BATCH_SIZE", &mut self.sync.block_batch_size)?;
        override_number(&lookup, "IX_TX_BATCH_SIZE", &mut self.sync.tx_batch_size)?;
        override_number(&lookup, "IX_MAX_REORG_DEPTH", &mut self.sync.max_reorg_depth)?;
        override_number(&lookup, "IX_RICH_LIST_SIZE", &mut self.rich_list.size)?;
        if let Some(contract) = lookup("IX_ENS_CONTRACT") {
            let address = crate::cli::parse_address(contract.trim()).map_err(|_| {
                ConfigError::Env {
                    var: "IX_ENS_CONTRACT",
                    value: contract.clone(),
                }
            })?;
            self.ens.contract = Some(address);
        }
        Ok(self)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sync = &self.sync;
        let zero = [
            ("sync.workers", sync.workers == 0),
            ("sync.queue_capacity", sync.queue_capacity == 0),
            ("sync.block_batch_size", sync.block_batch_size == 0),
            ("sync.tx_batch_size", sync.tx_batch_size == 0),
            ("sync.producer_flush_size", sync.producer_flush_size == 0),
            ("ens.chunk_size", self.ens.chunk_size == 0),
        ];
        if let Some((name, _)) = zero.iter().find(|(_, is_zero)| *is_zero) {
            return Err(ConfigError::Invalid(format!("{} must be at least 1", name)));
        }
        if self.storage.db_name.is_empty() {
            return Err(ConfigError::Invalid("storage.db_name is empty".to_string()));
        }
        self.density
            .normalized_windows()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}

fn override_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    target: &mut T,
) -> Result<(), ConfigError> {
    if let Some(value) = lookup(var) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { var, value })?;
    }
    Ok(())
}
