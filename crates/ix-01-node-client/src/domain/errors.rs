//! # Node Client Errors

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the node client.
///
/// Transient failures are returned to the caller as-is; the client never
/// retries internally.
#[derive(Debug, Error)]
pub enum NodeError {
    /// HTTP request failed below the JSON-RPC layer.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Socket or connection level failure.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Local socket I/O failure.
    #[error("IPC I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The call exceeded its per-call deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The node answered with a JSON-RPC error object.
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The response could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The node returned `null` for the requested object.
    #[error("{0} not found")]
    NotFound(String),

    /// The configured endpoint cannot be used.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl NodeError {
    /// Whether re-running the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NodeError::Http(_) | NodeError::Connection(_) | NodeError::Io(_) | NodeError::Timeout(_)
        )
    }

    /// Whether the node reported the object as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, NodeError::NotFound(_))
    }
}
