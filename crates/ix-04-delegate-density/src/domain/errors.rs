//! # Density Errors

use ix_01_node_client::NodeError;
use ix_02_chain_store::StoreError;
use thiserror::Error;

/// Failures of a density query. An address outside the rotation or an empty
/// store is a [`DensityLookup`](super::DensityLookup) variant, not an error.
#[derive(Debug, Error)]
pub enum DensityError {
    #[error("Invalid density windows: {0}")]
    InvalidWindows(String),

    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
