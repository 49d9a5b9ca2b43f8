//! Replica-Side Error Types
//!
//! Per REPLICATION_LOG_FLOW.md §2.3 and DEFERRED_APPLY.md §2.4,
//! integrity and storage-apply failures are fatal to the replica
//! connection; shutdown of a blocked waiter is a normal outcome.

use std::fmt;

use crate::log::LogError;
use crate::transport::TransportError;
use crate::txn::TransactionId;

/// Replica-side replication error type
#[derive(Debug, Clone)]
pub struct ReplicaError {
    /// Error kind
    pub kind: ReplicaErrorKind,
    /// Error message
    pub message: String,
}

/// Replica-side replication error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaErrorKind {
    /// Provider shut down while a waiter was blocked
    ShutDown,

    /// Record integrity verification failed
    Integrity,

    /// Storage engine rejected a record
    StorageApply,

    /// Acknowledgment could not be sent
    AckSend,
}

impl ReplicaError {
    /// Create a new replica-side error.
    pub fn new(kind: ReplicaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a shut-down error.
    pub fn shut_down() -> Self {
        Self::new(
            ReplicaErrorKind::ShutDown,
            "replication log provider shut down",
        )
    }

    /// Create a storage-apply error.
    pub fn storage_apply(txn: TransactionId, message: impl Into<String>) -> Self {
        Self::new(
            ReplicaErrorKind::StorageApply,
            format!("storage rejected a record of {}: {}", txn, message.into()),
        )
    }

    /// Check if this error is fatal to the replica connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            ReplicaErrorKind::Integrity | ReplicaErrorKind::StorageApply
        )
    }
}

impl From<LogError> for ReplicaError {
    fn from(err: LogError) -> Self {
        Self::new(ReplicaErrorKind::Integrity, err.to_string())
    }
}

impl From<TransportError> for ReplicaError {
    fn from(err: TransportError) -> Self {
        Self::new(ReplicaErrorKind::AckSend, err.to_string())
    }
}

impl fmt::Display for ReplicaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReplicaError({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for ReplicaError {}

/// Result type for replica-side operations
pub type ReplicaResult<T> = Result<T, ReplicaError>;
