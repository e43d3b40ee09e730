//! # Node Client Configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Node client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeClientConfig {
    /// `http(s)://` URL or path of the node's IPC socket (`~/` is expanded).
    pub endpoint: String,

    /// Per-call deadline in seconds.
    pub timeout_secs: u64,

    /// TCP/socket connect deadline in seconds.
    pub connect_timeout_secs: u64,

    /// Idle IPC connections kept for reuse.
    pub ipc_pool_size: usize,
}

impl Default for NodeClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8545".to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 5,
            ipc_pool_size: 16,
        }
    }
}

/// Transport selected by the endpoint string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Http(String),
    Ipc(PathBuf),
}

impl NodeClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Classify the endpoint.
    pub fn parsed_endpoint(&self) -> Endpoint {
        let raw = self.endpoint.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Endpoint::Http(raw.to_string())
        } else {
            Endpoint::Ipc(expand_home(raw))
        }
    }
}

/// Expand a leading `~/` using `$HOME`.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}
