//! CLI-specific error types

use std::fmt;
use std::io;

use crate::block::{BlockError, BlockErrorCode};
use crate::config::ConfigError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdout)
    IoError,
    /// Malformed command argument
    InvalidArgument,
    /// Block could not be read
    BlockError,
    /// Block failed checksum verification
    CorruptBlock,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "KEEL_CLI_CONFIG_ERROR",
            Self::IoError => "KEEL_CLI_IO_ERROR",
            Self::InvalidArgument => "KEEL_CLI_INVALID_ARGUMENT",
            Self::BlockError => "KEEL_CLI_BLOCK_ERROR",
            Self::CorruptBlock => "KEEL_CLI_CORRUPT_BLOCK",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidArgument, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<BlockError> for CliError {
    fn from(e: BlockError) -> Self {
        match e.code() {
            BlockErrorCode::ChecksumError | BlockErrorCode::FatalCorruption => {
                Self::new(CliErrorCode::CorruptBlock, e.to_string())
            }
            BlockErrorCode::MalformedCookie => Self::invalid_argument(e.to_string()),
            _ => Self::new(CliErrorCode::BlockError, e.to_string()),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
