//! Ports layer.
//!
//! The engine's outbound dependencies are the `NodeClient` and `ChainStore`
//! ports of ix-01 and ix-02.

pub mod inbound;

pub use inbound::DensityApi;
