//! # Run Locking
//!
//! Keeps two sync passes (or two rich-list passes) from racing on the same
//! cursor and producer aggregates.

mod flock;

pub use flock::{LockError, RunLock};
