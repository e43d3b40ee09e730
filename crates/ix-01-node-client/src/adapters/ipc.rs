//! IPC JSON-RPC transport over a local unix domain socket.
//!
//! Requests and responses are newline-delimited JSON objects. Idle
//! connections are pooled so parallel fetch workers do not serialize on a
//! single socket.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::config::NodeClientConfig;
use crate::domain::{JsonRpcRequest, JsonRpcResponse, NodeError};
use crate::ports::RpcTransport;

type Connection = BufReader<UnixStream>;

/// JSON-RPC over a unix socket.
pub struct IpcTransport {
    path: PathBuf,
    display: String,
    timeout: Duration,
    connect_timeout: Duration,
    pool_size: usize,
    idle: Mutex<Vec<Connection>>,
    request_id: AtomicU64,
}

impl IpcTransport {
    pub fn new(path: impl AsRef<Path>, config: &NodeClientConfig) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            display: path.display().to_string(),
            path,
            timeout: config.timeout(),
            connect_timeout: config.connect_timeout(),
            pool_size: config.ipc_pool_size,
            idle: Mutex::new(Vec::new()),
            request_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn checkout(&self) -> Result<Connection, NodeError> {
        if let Some(conn) = self.idle.lock().pop() {
            return Ok(conn);
        }
        let stream = timeout(self.connect_timeout, UnixStream::connect(&self.path))
            .await
            .map_err(|_| NodeError::Timeout(self.connect_timeout))?
            .map_err(|e| NodeError::Connection(format!("{}: {}", self.display, e)))?;
        Ok(BufReader::new(stream))
    }

    fn checkin(&self, conn: Connection) {
        let mut idle = self.idle.lock();
        if idle.len() < self.pool_size {
            idle.push(conn);
        }
    }

    async fn roundtrip(conn: &mut Connection, payload: &[u8]) -> Result<JsonRpcResponse, NodeError> {
        conn.get_mut().write_all(payload).await?;
        conn.get_mut().flush().await?;

        let mut line = String::new();
        let read = conn.read_line(&mut line).await?;
        if read == 0 {
            return Err(NodeError::Connection("IPC socket closed by node".to_string()));
        }
        serde_json::from_str(&line).map_err(|e| NodeError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RpcTransport for IpcTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, NodeError> {
        let id = self.next_id();
        let request = JsonRpcRequest::new(method, params, id);
        let mut payload =
            serde_json::to_vec(&request).map_err(|e| NodeError::Decode(e.to_string()))?;
        payload.push(b'\n');

        let mut conn = self.checkout().await?;
        let response = match timeout(self.timeout, Self::roundtrip(&mut conn, &payload)).await {
            Ok(result) => result?,
            // A timed-out connection may still deliver the stale reply; drop it.
            Err(_) => return Err(NodeError::Timeout(self.timeout)),
        };

        if response.id.is_some_and(|rid| rid != id) {
            return Err(NodeError::Decode(format!(
                "response id {:?} does not match request id {}",
                response.id, id
            )));
        }

        self.checkin(conn);
        response.into_result()
    }

    fn endpoint(&self) -> &str {
        &self.display
    }
}
