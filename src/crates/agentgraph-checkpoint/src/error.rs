//! Error types for checkpoint operations

use thiserror::Error;

/// Result type for checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur during checkpoint capture, persistence, or restore
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Checkpoint not found
    #[error("Checkpoint not found: {0}")]
    NotFound(String),

    /// Resume attempted past the checkpoint's expiry
    #[error("Checkpoint expired: {checkpoint_id}")]
    Expired {
        /// Id of the expired checkpoint
        checkpoint_id: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Checkpoint cannot be constructed or is malformed
    #[error("Invalid checkpoint: {0}")]
    Invalid(String),
}
