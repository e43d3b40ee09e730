//! # RPC Node Client
//!
//! Maps the `NodeClient` contract onto the node's JSON-RPC methods.

use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use shared_types::encoding::quantity;
use shared_types::{Address, Block, BlockHeight, DelegateVote, Hash, Receipt, Transaction, U256};
use tracing::{debug, info};

use crate::config::{Endpoint, NodeClientConfig};
use crate::domain::rpc::{
    decode_address_word, ens_address_call, RpcBlock, RpcDelegate, RpcReceipt, RpcTransaction,
};
use crate::domain::{BlockTag, NodeError};
use crate::ports::{NodeClient, RpcTransport};

/// Node client speaking JSON-RPC through any `RpcTransport`.
pub struct RpcNodeClient {
    transport: Box<dyn RpcTransport>,
}

impl RpcNodeClient {
    /// Build a client for the configured endpoint.
    ///
    /// `http(s)://` endpoints use HTTP; anything else is treated as an IPC
    /// socket path.
    pub fn connect(config: &NodeClientConfig) -> Result<Self, NodeError> {
        let transport: Box<dyn RpcTransport> = match config.parsed_endpoint() {
            Endpoint::Http(url) => Box::new(crate::adapters::HttpTransport::new(url, config)?),
            #[cfg(unix)]
            Endpoint::Ipc(path) => Box::new(crate::adapters::IpcTransport::new(path, config)),
            #[cfg(not(unix))]
            Endpoint::Ipc(path) => {
                return Err(NodeError::InvalidEndpoint(format!(
                    "IPC endpoints are unsupported on this platform: {}",
                    path.display()
                )))
            }
        };
        info!("[ix-01] Node client using {}", transport.endpoint());
        Ok(Self { transport })
    }

    pub fn with_transport(transport: Box<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    async fn request<R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
        what: impl FnOnce() -> String,
    ) -> Result<R, NodeError> {
        let started = Instant::now();
        let result = self.transport.call(method, params).await;
        ix_telemetry::NODE_RPC_DURATION
            .with_label_values(&[method])
            .observe(started.elapsed().as_secs_f64());

        let value = match result {
            Ok(value) => value,
            Err(e) => {
                ix_telemetry::NODE_RPC_ERRORS.with_label_values(&[method]).inc();
                debug!(method, error = %e, "[ix-01] RPC call failed");
                return Err(e);
            }
        };
        if value.is_null() {
            return Err(NodeError::NotFound(what()));
        }
        serde_json::from_value(value).map_err(|e| {
            ix_telemetry::NODE_RPC_ERRORS.with_label_values(&[method]).inc();
            NodeError::Decode(format!("{}: {}", method, e))
        })
    }
}

#[async_trait]
impl NodeClient for RpcNodeClient {
    async fn tip_height(&self) -> Result<BlockHeight, NodeError> {
        let raw: String = self
            .request("eth_blockNumber", json!([]), || "head block".to_string())
            .await?;
        quantity::parse(&raw).map_err(NodeError::Decode)
    }

    async fn get_block(&self, height: BlockHeight) -> Result<Block, NodeError> {
        let rpc: RpcBlock = self
            .request(
                "eth_getBlockByNumber",
                json!([BlockTag::Number(height).to_param(), false]),
                || format!("block {}", height),
            )
            .await?;
        Block::try_from(rpc)
    }

    async fn get_transaction(&self, hash: Hash) -> Result<Transaction, NodeError> {
        let rpc: RpcTransaction = self
            .request("eth_getTransactionByHash", json!([hash]), || {
                format!("transaction {:?}", hash)
            })
            .await?;
        Transaction::try_from(rpc)
    }

    async fn get_receipt(&self, hash: Hash) -> Result<Receipt, NodeError> {
        let rpc: RpcReceipt = self
            .request("eth_getTransactionReceipt", json!([hash]), || {
                format!("receipt {:?}", hash)
            })
            .await?;
        Ok(rpc.into())
    }

    async fn get_delegate_votes(&self, at: BlockTag) -> Result<Vec<DelegateVote>, NodeError> {
        let rpc: Vec<RpcDelegate> = self
            .request("dpos_getDelegates", json!([at.to_param()]), || {
                "delegates".to_string()
            })
            .await?;
        Ok(rpc.into_iter().map(Into::into).collect())
    }

    async fn get_balance(&self, address: Address) -> Result<U256, NodeError> {
        self.request(
            "eth_getBalance",
            json!([address, BlockTag::Latest.to_param()]),
            || format!("balance of {:?}", address),
        )
        .await
    }

    async fn get_stake(&self, address: Address) -> Result<u64, NodeError> {
        let raw: Value = self
            .request(
                "eth_getStaked",
                json!([address, BlockTag::Latest.to_param()]),
                || format!("stake of {:?}", address),
            )
            .await?;
        match raw {
            Value::String(s) => quantity::parse(&s).map_err(NodeError::Decode),
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| NodeError::Decode(format!("stake out of range: {}", n))),
            other => Err(NodeError::Decode(format!("unexpected stake value: {}", other))),
        }
    }

    async fn ens_address(&self, contract: Address, name_hash: Hash) -> Result<Address, NodeError> {
        let raw: String = self
            .request(
                "eth_call",
                json!([
                    ens_address_call(contract, name_hash),
                    BlockTag::Latest.to_param()
                ]),
                || format!("resolver entry {:?}", name_hash),
            )
            .await?;
        decode_address_word(&raw)
    }
}
