//! # Indexer Runtime
//!
//! Wires the subsystems together and runs one command per invocation.
//!
//! ## Modular Structure
//!
//! - `container/` - configuration and dependency wiring
//! - `adapters/` - storage engines that live outside the chain store crate
//! - `cli` - command-line flags and subcommands
//! - `commands` - `fetchblocks`, `getblock`, `computerich`, `delegates`
//!
//! ## Startup Sequence
//!
//! 1. Parse flags, initialise telemetry
//! 2. Load configuration (defaults → TOML file → `IX_*` env → flags)
//! 3. Build the container: node client, chain store
//! 4. Run the command; Ctrl-C asks a running sync to stop fetching

pub mod adapters;
pub mod cli;
pub mod commands;
pub mod container;

pub use cli::{Cli, Command};
pub use commands::CommandError;
pub use container::{ContainerError, IndexerConfig, IndexerContainer};
