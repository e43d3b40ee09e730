//! # Chain Store Errors

use std::fmt;

use thiserror::Error;

/// Errors surfaced by `ChainStore` operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key-value engine failed. Transient from the caller's view.
    #[error("Storage backend error: {0}")]
    Backend(#[from] KVStoreError),

    /// A stored value could not be decoded.
    #[error("Corrupted record under {key}: {message}")]
    Corrupted { key: String, message: String },

    /// A value could not be encoded for writing.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Backend(_))
    }
}

/// Key-value engine errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KVStoreError {
    /// I/O error during read/write.
    IOError { message: String },
    /// Data corruption in the store.
    CorruptionError { message: String },
}

impl fmt::Display for KVStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KVStoreError::IOError { message } => write!(f, "KV store I/O error: {}", message),
            KVStoreError::CorruptionError { message } => {
                write!(f, "KV store corruption: {}", message)
            }
        }
    }
}

impl std::error::Error for KVStoreError {}

impl From<std::io::Error> for KVStoreError {
    fn from(err: std::io::Error) -> Self {
        KVStoreError::IOError {
            message: err.to_string(),
        }
    }
}
