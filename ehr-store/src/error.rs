//! Store Error Types

use thiserror::Error;

/// Local persistence errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend read/write failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Stored bytes could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored entry contradicts its key
    #[error("Corrupt entry under {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}
