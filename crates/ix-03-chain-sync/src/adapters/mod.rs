//! Adapters: process-wide run locking.

pub mod lock;

pub use lock::{LockError, RunLock};
