//! # JSON-RPC Wire Types
//!
//! Request/response envelopes and the node's block, transaction and receipt
//! objects. Quantities arrive as `0x`-prefixed hex and are decoded here so the
//! rest of the indexer only sees `shared_types` entities.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_types::encoding::{hex_bytes, quantity};
use shared_types::{Address, Block, DelegateVote, Hash, Receipt, Transaction, U256};

use super::errors::NodeError;

/// JSON-RPC 2.0 request.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: Value,
    pub id: u64,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(method: &'a str, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id,
        }
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcResponse {
    /// Unwrap the result, turning an error object into `NodeError::Rpc`.
    ///
    /// A missing or `null` result is returned as `Value::Null`.
    pub fn into_result(self) -> Result<Value, NodeError> {
        if let Some(error) = self.error {
            return Err(NodeError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// Block selector for state queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Number(u64),
}

impl BlockTag {
    pub fn to_param(self) -> Value {
        match self {
            BlockTag::Latest => Value::String("latest".to_string()),
            BlockTag::Number(n) => Value::String(format!("0x{:x}", n)),
        }
    }
}

// =============================================================================
// CONTRACT CALLS
// =============================================================================

/// Selector of `addr(bytes32)` on the name resolver.
pub const ENS_ADDR_SELECTOR: [u8; 4] = [0x3b, 0x3b, 0x57, 0xde];

/// `eth_call` object asking `contract` for the address behind `name_hash`.
pub fn ens_address_call(contract: Address, name_hash: Hash) -> Value {
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(&ENS_ADDR_SELECTOR);
    data.extend_from_slice(name_hash.as_bytes());
    json!({
        "to": contract,
        "data": format!("0x{}", hex::encode(data)),
    })
}

/// Address held in the low 20 bytes of the first 32-byte return word.
pub fn decode_address_word(raw: &str) -> Result<Address, NodeError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes =
        hex::decode(digits).map_err(|e| NodeError::Decode(format!("eth_call output: {}", e)))?;
    if bytes.len() < 32 {
        return Err(NodeError::Decode(format!(
            "eth_call returned {} bytes, expected a 32-byte word",
            bytes.len()
        )));
    }
    Ok(Address::from_slice(&bytes[12..32]))
}

// =============================================================================
// NODE OBJECTS
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    #[serde(with = "quantity")]
    pub number: u64,
    #[serde(with = "quantity")]
    pub timestamp: u64,
    pub hash: Hash,
    pub parent_hash: Hash,
    #[serde(default, with = "hex_bytes")]
    pub signature: Vec<u8>,
    #[serde(default)]
    pub transactions_root: Hash,
    #[serde(default)]
    pub receipts_root: Hash,
    #[serde(default, with = "quantity")]
    pub size: u64,
    #[serde(default)]
    pub transaction_count: Option<String>,
    #[serde(default, with = "quantity")]
    pub gas_used: u64,
    #[serde(default, with = "quantity")]
    pub gas_limit: u64,
    #[serde(default)]
    pub transactions: Vec<Hash>,
    #[serde(default)]
    pub delegates: Vec<Address>,
    pub producer: Address,
}

impl TryFrom<RpcBlock> for Block {
    type Error = NodeError;

    fn try_from(b: RpcBlock) -> Result<Self, Self::Error> {
        let transaction_count = match b.transaction_count.as_deref() {
            Some(raw) => quantity::parse(raw).map_err(NodeError::Decode)?,
            None => b.transactions.len() as u64,
        };
        Ok(Block {
            number: b.number,
            timestamp: b.timestamp,
            hash: b.hash,
            parent_hash: b.parent_hash,
            signature: b.signature,
            transactions_root: b.transactions_root,
            receipts_root: b.receipts_root,
            size: b.size,
            transaction_count,
            gas_used: b.gas_used,
            gas_limit: b.gas_limit,
            transactions: b.transactions,
            delegates: b.delegates,
            producer: b.producer,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub hash: Hash,
    #[serde(with = "quantity")]
    pub nonce: u64,
    #[serde(default)]
    pub block_hash: Option<Hash>,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub transaction_index: Option<String>,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    pub value: U256,
    #[serde(with = "quantity")]
    pub gas: u64,
    #[serde(default, with = "quantity")]
    pub gas_price: u64,
    #[serde(default, with = "quantity")]
    pub work_nonce: u64,
    #[serde(default, with = "hex_bytes")]
    pub input: Vec<u8>,
}

impl TryFrom<RpcTransaction> for Transaction {
    type Error = NodeError;

    fn try_from(t: RpcTransaction) -> Result<Self, Self::Error> {
        // Pending transactions carry no block coordinates.
        let block_hash = t
            .block_hash
            .ok_or_else(|| NodeError::Decode(format!("transaction {:?} is pending", t.hash)))?;
        let parse_opt = |raw: Option<String>| -> Result<u64, NodeError> {
            raw.as_deref()
                .map(quantity::parse)
                .transpose()
                .map_err(NodeError::Decode)
                .map(|v| v.unwrap_or(0))
        };
        Ok(Transaction {
            hash: t.hash,
            nonce: t.nonce,
            block_hash,
            block_number: parse_opt(t.block_number)?,
            transaction_index: parse_opt(t.transaction_index)?,
            from: t.from,
            to: t.to,
            value: t.value,
            gas: t.gas,
            gas_price: t.gas_price,
            work_nonce: t.work_nonce,
            input: t.input,
            timestamp: 0,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    #[serde(default, with = "quantity")]
    pub status: u64,
    #[serde(with = "quantity")]
    pub gas_used: u64,
    #[serde(default, with = "quantity")]
    pub cumulative_gas_used: u64,
    #[serde(default)]
    pub contract_address: Option<Address>,
}

impl From<RpcReceipt> for Receipt {
    fn from(r: RpcReceipt) -> Self {
        Receipt {
            status: r.status,
            gas_used: r.gas_used,
            cumulative_gas_used: r.cumulative_gas_used,
            contract_address: r.contract_address,
        }
    }
}

/// Entry of `dpos_getDelegates`.
#[derive(Debug, Deserialize)]
pub struct RpcDelegate {
    pub address: Address,
    #[serde(default)]
    pub stake: u64,
}

impl From<RpcDelegate> for DelegateVote {
    fn from(d: RpcDelegate) -> Self {
        DelegateVote {
            address: d.address,
            stake: d.stake,
        }
    }
}
