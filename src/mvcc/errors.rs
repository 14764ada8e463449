//! MVCC errors
//!
//! All of these are recoverable. A transaction that hits one stays in its
//! current state until the caller commits or rolls it back.

use thiserror::Error;

/// Result type for MVCC operations
pub type MvccResult<T> = Result<T, MvccError>;

/// MVCC errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MvccError {
    #[error("Illegal timestamp: {0}")]
    IllegalTimestamp(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Write conflict on key {0}")]
    WriteConflict(String),

    #[error("Prepare conflict on key {0}")]
    PrepareConflict(String),

    #[error("Invalid transaction state: {0}")]
    InvalidState(String),

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Table already exists: {0}")]
    TableExists(String),
}

impl MvccError {
    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            MvccError::IllegalTimestamp(_) => "KEEL_ILLEGAL_TIMESTAMP",
            MvccError::DuplicateKey(_) => "KEEL_DUPLICATE_KEY",
            MvccError::WriteConflict(_) => "KEEL_WRITE_CONFLICT",
            MvccError::PrepareConflict(_) => "KEEL_PREPARE_CONFLICT",
            MvccError::InvalidState(_) => "KEEL_INVALID_STATE",
            MvccError::NotFound(_) => "KEEL_NOT_FOUND",
            MvccError::UnknownTable(_) => "KEEL_UNKNOWN_TABLE",
            MvccError::TableExists(_) => "KEEL_TABLE_EXISTS",
        }
    }
}
