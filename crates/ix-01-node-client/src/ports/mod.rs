//! Ports layer: the client API (inbound) and the transport it drives (outbound).

pub mod inbound;
pub mod outbound;

pub use inbound::NodeClient;
pub use outbound::RpcTransport;
