//! Log Model Error Types
//!
//! Per REPLICATION_LOG_FLOW.md §2.3:
//! - A checksum mismatch on the replica is fatal to that connection

use std::fmt;

use crate::txn::TransactionId;

/// Log model error type
#[derive(Debug, Clone)]
pub struct LogError {
    /// Error kind
    pub kind: LogErrorKind,
    /// Error message
    pub message: String,
}

/// Log model error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogErrorKind {
    /// Payload checksum did not match
    ChecksumMismatch,
}

impl LogError {
    /// Create a new log model error.
    pub fn new(kind: LogErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a checksum mismatch error.
    pub fn checksum_mismatch(txn: TransactionId, expected: u32, actual: u32) -> Self {
        Self::new(
            LogErrorKind::ChecksumMismatch,
            format!(
                "payload checksum mismatch for {}: expected {:#010x}, got {:#010x}",
                txn, expected, actual
            ),
        )
    }

    /// Check if this error is fatal to the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, LogErrorKind::ChecksumMismatch)
    }
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogError({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for LogError {}

/// Result type for log model operations
pub type LogResult<T> = Result<T, LogError>;
