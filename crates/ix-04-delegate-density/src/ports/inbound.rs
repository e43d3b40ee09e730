//! # Inbound Ports (Driving Ports)

use async_trait::async_trait;
use shared_types::Address;

use crate::domain::{DensityError, DensityLookup};

/// Delegate density queries, as served to the CLI.
#[async_trait]
pub trait DensityApi: Send + Sync {
    /// Density of every delegate in the latest rotation, or of `address`
    /// alone.
    async fn delegate_density(&self, address: Option<Address>)
        -> Result<DensityLookup, DensityError>;
}
