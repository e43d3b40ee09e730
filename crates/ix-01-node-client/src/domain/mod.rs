//! Domain layer: wire types and errors.

pub mod errors;
pub mod rpc;

pub use errors::NodeError;
pub use rpc::{BlockTag, JsonRpcRequest, JsonRpcResponse};
