//! Block layer error types
//!
//! Error codes:
//! - KEEL_MALFORMED_COOKIE (ERROR severity)
//! - KEEL_INVALID_BLOCK_SIZE (ERROR severity)
//! - KEEL_CACHE_CAPACITY_EXCEEDED (ERROR severity, never leaves the read path)
//! - KEEL_BLOCK_IO_ERROR (ERROR severity)
//! - KEEL_UNKNOWN_OBJECT (ERROR severity)
//! - KEEL_CHECKSUM_ERROR (ERROR severity, only returned in verify or quiet mode)
//! - KEEL_FATAL_CORRUPTION (FATAL severity)

use std::fmt;
use std::io;

/// Severity levels for block errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, process continues
    Error,
    /// The process path must terminate
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Block-specific error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockErrorCode {
    /// Address cookie could not be decoded
    MalformedCookie,
    /// Cookie size is inconsistent with the owning store
    InvalidBlockSize,
    /// Chunk cache cannot hold the requested chunk
    CacheCapacityExceeded,
    /// Positioned read or handle open failed
    IoError,
    /// No block-store handle exists for the requested object id
    UnknownObject,
    /// Block content failed checksum validation
    ChecksumError,
    /// Checksum failure on an ordinary read
    FatalCorruption,
}

impl BlockErrorCode {
    /// Returns the stable string code.
    pub fn code(&self) -> &'static str {
        match self {
            BlockErrorCode::MalformedCookie => "KEEL_MALFORMED_COOKIE",
            BlockErrorCode::InvalidBlockSize => "KEEL_INVALID_BLOCK_SIZE",
            BlockErrorCode::CacheCapacityExceeded => "KEEL_CACHE_CAPACITY_EXCEEDED",
            BlockErrorCode::IoError => "KEEL_BLOCK_IO_ERROR",
            BlockErrorCode::UnknownObject => "KEEL_UNKNOWN_OBJECT",
            BlockErrorCode::ChecksumError => "KEEL_CHECKSUM_ERROR",
            BlockErrorCode::FatalCorruption => "KEEL_FATAL_CORRUPTION",
        }
    }

    /// Returns the severity level for this error.
    pub fn severity(&self) -> Severity {
        match self {
            BlockErrorCode::FatalCorruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for BlockErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Block error with context.
#[derive(Debug)]
pub struct BlockError {
    code: BlockErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl BlockError {
    fn new(code: BlockErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create a malformed cookie error
    pub fn malformed_cookie(message: impl Into<String>) -> Self {
        Self::new(BlockErrorCode::MalformedCookie, message)
    }

    /// Create an invalid block size error
    pub fn invalid_block_size(store: &str, size: u32, allocation_unit: u32) -> Self {
        Self::new(
            BlockErrorCode::InvalidBlockSize,
            format!(
                "{}: impossibly small block size of {}B, less than allocation size of {}",
                store, size, allocation_unit
            ),
        )
    }

    /// Create a cache capacity error
    pub fn cache_capacity_exceeded(size: u32, capacity: u64) -> Self {
        Self::new(
            BlockErrorCode::CacheCapacityExceeded,
            format!("chunk of {}B cannot fit in a {}B chunk cache", size, capacity),
        )
    }

    /// Create an I/O error
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: BlockErrorCode::IoError,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Create an unknown object error
    pub fn unknown_object(object_id: u32) -> Self {
        Self::new(
            BlockErrorCode::UnknownObject,
            format!("no block store for object id {}", object_id),
        )
    }

    /// Create a recoverable checksum error with block location context
    pub fn checksum_error(store: &str, offset: i64, size: u32, checksum: u32) -> Self {
        Self {
            code: BlockErrorCode::ChecksumError,
            message: format!("{}: read checksum error", store),
            details: Some(format!(
                "offset: {}, size: {}, checksum: {:#x}",
                offset, size, checksum
            )),
            source: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> BlockErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error is fatal
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for BlockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for block operations
pub type BlockResult<T> = Result<T, BlockError>;
