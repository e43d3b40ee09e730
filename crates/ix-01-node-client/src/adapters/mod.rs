//! Adapters layer: concrete transports and the mock node.

pub mod http;
#[cfg(unix)]
pub mod ipc;
pub mod mock;

pub use http::HttpTransport;
#[cfg(unix)]
pub use ipc::IpcTransport;
pub use mock::MockNodeClient;
