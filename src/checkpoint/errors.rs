//! Checkpoint errors

use thiserror::Error;

use crate::mvcc::MvccError;

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Checkpoint errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckpointError {
    #[error("Checkpoint not found: {0}")]
    NotFound(String),

    #[error("Invalid checkpoint name: {0}")]
    InvalidName(String),

    #[error(transparent)]
    Mvcc(#[from] MvccError),
}

impl CheckpointError {
    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            CheckpointError::NotFound(_) => "KEEL_CHECKPOINT_NOT_FOUND",
            CheckpointError::InvalidName(_) => "KEEL_CHECKPOINT_INVALID_NAME",
            CheckpointError::Mvcc(err) => err.code(),
        }
    }
}
