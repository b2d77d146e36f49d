//! Error handling for the range scanner
//!
//! Validation failures abort a chunk invocation and surface as a single
//! message. Per-probe failures never reach this type: they are folded into a
//! `Closed` status or the unresolved server name.

use thiserror::Error;

/// Main error type for scanning operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid IP address format: {0}")]
    InvalidAddressFormat(String),

    #[error("Invalid port number: {0}")]
    InvalidPortNumber(String),

    #[error("Malformed port token: {0:?}")]
    MalformedPortToken(String),

    #[error("Address range too large: {requested} addresses (limit {limit})")]
    RangeTooLarge { requested: u64, limit: u64 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Output error: {0}")]
    OutputError(String),

    #[error("Chunk starts at cursor {actual}, session is at {expected}")]
    CursorMismatch { expected: u64, actual: u64 },
}

impl From<csv::Error> for ScanError {
    fn from(err: csv::Error) -> Self {
        ScanError::OutputError(err.to_string())
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::ParseError(err.to_string())
    }
}

/// Result type alias for scan operations
pub type ScanResult<T> = std::result::Result<T, ScanError>;
