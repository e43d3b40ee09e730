//! HTTP JSON-RPC transport.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::NodeClientConfig;
use crate::domain::{JsonRpcRequest, JsonRpcResponse, NodeError};
use crate::ports::RpcTransport;

/// JSON-RPC over HTTP POST.
pub struct HttpTransport {
    client: Client,
    url: String,
    timeout: Duration,
    request_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, config: &NodeClientConfig) -> Result<Self, NodeError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(NodeError::Http)?;

        Ok(Self {
            client,
            url: url.into(),
            timeout: config.timeout(),
            request_id: AtomicU64::new(1),
        })
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, NodeError> {
        let request = JsonRpcRequest::new(method, params, self.next_id());

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NodeError::Timeout(self.timeout)
                } else if e.is_connect() {
                    NodeError::Connection(format!("Cannot connect to {}", self.url))
                } else {
                    NodeError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NodeError::Connection(format!(
                "{} answered HTTP {}",
                self.url, status
            )));
        }

        let rpc_response: JsonRpcResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                NodeError::Timeout(self.timeout)
            } else {
                NodeError::Decode(e.to_string())
            }
        })?;

        rpc_response.into_result()
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
