//! Domain layer: the rotation rule and the windowed density walk. Pure, no I/O.

pub mod errors;
pub mod rotation;
pub mod stats;

pub use errors::DensityError;
pub use rotation::scheduled_producer;
pub use stats::{compute_density, DelegateStat, DensityInput, DensityLookup, DensityReport};
