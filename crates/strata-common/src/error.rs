//! Error types for Strata
//!
//! This module defines the common error types used by the record codec.

use thiserror::Error;

/// Common result type for Strata operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for Strata
#[derive(Debug, Error)]
pub enum Error {
    // Stream errors
    #[error("disk I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("short {what}: got {actual} bytes of {expected}")]
    ShortRead {
        what: &'static str,
        expected: u64,
        actual: u64,
    },

    #[error("short {what} write: wrote {actual} bytes of {expected}")]
    ShortWrite {
        what: &'static str,
        expected: u64,
        actual: u64,
    },

    // Framing errors
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("corrupt frame: {0}")]
    CorruptFrame(String),

    #[error("record of {length} bytes exceeds limit {limit}")]
    RecordTooLarge { length: u64, limit: u64 },

    #[error("compression error: {0}")]
    Compression(String),

    #[error("decompression error: {0}")]
    Decompression(String),

    // Record boundary errors
    #[error("failed to get record ({name}:{offset}): {source}")]
    GetRecord {
        name: String,
        offset: u64,
        #[source]
        source: Box<Error>,
    },

    #[error("couldn't write {record} to '{name}': {source}")]
    WriteRecord {
        record: String,
        name: String,
        #[source]
        source: Box<Error>,
    },

    // Internal errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an invalid header error
    pub fn invalid_header(msg: impl Into<String>) -> Self {
        Self::InvalidHeader(msg.into())
    }

    /// Create a corrupt frame error
    pub fn corrupt_frame(msg: impl Into<String>) -> Self {
        Self::CorruptFrame(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Wrap a decode failure with the stream name and frame offset
    pub fn get_record(name: impl Into<String>, offset: u64, source: Self) -> Self {
        Self::GetRecord {
            name: name.into(),
            offset,
            source: Box::new(source),
        }
    }

    /// Wrap an encode failure with the record description and stream name
    pub fn write_record(record: impl Into<String>, name: impl Into<String>, source: Self) -> Self {
        Self::WriteRecord {
            record: record.into(),
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Check if this error was caused by a truncated frame
    #[must_use]
    pub fn is_truncation(&self) -> bool {
        match self {
            Self::ShortRead { .. } => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            Self::GetRecord { source, .. } | Self::WriteRecord { source, .. } => {
                source.is_truncation()
            }
            _ => false,
        }
    }

    /// Check if this error means the stored data cannot be trusted
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        match self {
            Self::InvalidHeader(_) | Self::CorruptFrame(_) | Self::Decompression(_) => true,
            Self::GetRecord { source, .. } => source.is_corruption(),
            _ => false,
        }
    }

    /// Innermost error, looking through the record boundary wrappers
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::GetRecord { source, .. } | Self::WriteRecord { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}
