//! # Outbound Ports (Driven Ports)
//!
//! The byte-moving layer below `RpcNodeClient`.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::NodeError;

/// Carries one JSON-RPC call to the node and returns its raw result.
///
/// Implementations own request ids and enforce the per-call timeout.
/// A JSON-RPC error object must be surfaced as `NodeError::Rpc`; a `null`
/// result is returned as `Value::Null`.
///
/// Production: `HttpTransport`, `IpcTransport`
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<Value, NodeError>;

    /// Human-readable endpoint for logs.
    fn endpoint(&self) -> &str;
}

#[async_trait]
impl<T: RpcTransport + ?Sized> RpcTransport for Box<T> {
    async fn call(&self, method: &str, params: Value) -> Result<Value, NodeError> {
        (**self).call(method, params).await
    }

    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }
}
