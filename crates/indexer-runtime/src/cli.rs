//! # Command Line
//!
//! Global flags override the file and environment configuration; the
//! subcommand picks the job.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shared_types::{Address, BlockHeight};

use crate::container::{IndexerConfig, StoreBackend};

/// Ledger indexer: sync blocks from a node and report delegate density.
#[derive(Parser, Debug)]
#[command(name = "ix-indexer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Node endpoint: `http(s)://` URL or IPC socket path
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Directory holding the database
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Database name
    #[arg(long, global = true)]
    pub db_name: Option<String>,

    /// Block fetch workers
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    /// Storage engine
    #[arg(long, global = true, value_enum)]
    pub backend: Option<StoreBackend>,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Name resolver contract used by `enssync`
    #[arg(long, global = true, value_parser = parse_address)]
    pub ens_contract: Option<Address>,

    /// Print Prometheus metrics after the command
    #[arg(long, global = true)]
    pub dump_metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run one sync pass (reorg repair, then forward sync to the node's tip)
    #[command(name = "fetchblocks", visible_alias = "f")]
    FetchBlocks,

    /// Print a stored block as JSON
    #[command(name = "getblock", visible_alias = "gb")]
    GetBlock { number: BlockHeight },

    /// Refresh the rich list from recently active addresses
    #[command(name = "computerich", visible_alias = "cr")]
    ComputeRich,

    /// Re-resolve every stored name against the resolver contract
    #[command(name = "enssync", visible_alias = "ens")]
    EnsSync,

    /// Print the delegate density report
    #[command(name = "delegates", visible_alias = "d")]
    Delegates {
        /// Only report this delegate
        #[arg(long, value_parser = parse_address)]
        address: Option<Address>,

        /// Window length in seconds; repeat for several windows
        #[arg(long = "window")]
        windows: Vec<u64>,
    },
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut IndexerConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.node.endpoint = endpoint.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.storage.data_dir = dir.clone();
        }
        if let Some(name) = &self.db_name {
            config.storage.db_name = name.clone();
        }
        if let Some(threads) = self.threads {
            config.sync.workers = threads;
        }
        if let Some(backend) = self.backend {
            config.storage.backend = backend;
        }
        if let Some(contract) = self.ens_contract {
            config.ens.contract = Some(contract);
        }
        if let Command::Delegates { windows, .. } = &self.command {
            if !windows.is_empty() {
                config.density.windows = windows.clone();
            }
        }
    }
}

/// `0x`-prefixed or bare 40-digit hex.
pub fn parse_address(s: &str) -> Result<Address, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(digits).map_err(|e| format!("invalid address '{}': {}", s, e))?;
    if bytes.len() != Address::len_bytes() {
        return Err(format!(
            "invalid address '{}': expected 20 bytes, got {}",
            s,
            bytes.len()
        ));
    }
    Ok(Address::from_slice(&bytes))
}
