//! # IX-01 Node Client
//!
//! Wire-level client to the remote ledger node.
//!
//! **Subsystem ID:** 01  
//! **Architecture:** Hexagonal (Ports/Adapters)
//!
//! ## Contract
//!
//! | Operation | JSON-RPC method |
//! |-----------|-----------------|
//! | `tip_height` | `eth_blockNumber` |
//! | `get_block` | `eth_getBlockByNumber(hex, false)` |
//! | `get_transaction` | `eth_getTransactionByHash` |
//! | `get_receipt` | `eth_getTransactionReceipt` |
//! | `get_delegate_votes` / `get_validator_set` | `dpos_getDelegates` |
//! | `get_balance` | `eth_getBalance` |
//! | `get_stake` | `eth_getStaked` |
//! | `ens_address` | `eth_call` of `addr(bytes32)` on the resolver |
//!
//! Every call is bounded by the transport's per-call timeout. Failures are
//! returned to the caller, never retried here.
//!
//! ## Module Structure
//!
//! ```text
//! ix-01-node-client/
//! ├── domain/      # NodeError, JSON-RPC envelopes, node wire objects
//! ├── ports/       # NodeClient (inbound) + RpcTransport (outbound)
//! ├── adapters/    # HttpTransport, IpcTransport, MockNodeClient
//! ├── service.rs   # RpcNodeClient
//! └── config.rs    # NodeClientConfig
//! ```

#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::MockNodeClient;
pub use config::NodeClientConfig;
pub use domain::{BlockTag, NodeError};
pub use ports::{NodeClient, RpcTransport};
pub use service::RpcNodeClient;
