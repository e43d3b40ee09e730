//! # Delegate Density (ix-04)
//!
//! How reliably has each delegate produced the blocks the rotation assigned
//! to it over the last few minutes or hours?
//!
//! ## Algorithm
//!
//! For every second `t` of the longest window, walking back from the latest
//! stored block:
//!
//! 1. `scheduled = delegates[(t / period / turn_block_count) % delegate_count]`
//!    (no one, if the turn points past the list or the rotation is undefined);
//! 2. the tick counts toward `scheduled`'s total, and as a miss unless a
//!    stored block with timestamp `t` was produced by `scheduled`;
//! 3. at each window boundary the running totals are snapshotted.
//!
//! Density is `1 - missed / total`, and 0 when nothing was scheduled.
//!
//! ## Crate Structure
//!
//! - `domain/` - `scheduled_producer`, `compute_density`, report types
//! - `ports/` - `DensityApi` (inbound)
//! - `service.rs` - `DensityEngine` over `NodeClient` + `ChainStore`
//! - `config.rs` - `DensityConfig`, `DposConfig`

pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use config::{DensityConfig, DposConfig};
pub use domain::{
    compute_density, scheduled_producer, DelegateStat, DensityError, DensityInput, DensityLookup,
    DensityReport,
};
pub use ports::DensityApi;
pub use service::DensityEngine;
