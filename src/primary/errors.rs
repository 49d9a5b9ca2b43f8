//! Primary-Side Error Types

use std::fmt;

use crate::commit::CommitError;
use crate::transport::TransportError;
use crate::txn::TxnError;

/// Primary-side replication error type
#[derive(Debug, Clone)]
pub struct PrimaryError {
    /// Error kind
    pub kind: PrimaryErrorKind,
    /// Error message
    pub message: String,
}

/// Primary-side replication error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryErrorKind {
    /// Configuration error
    ConfigurationError,

    /// Transport handoff failed (connection loss)
    Transport,

    /// Dispatch would re-send or reorder a batch on a stream
    SequenceOrder,

    /// A replica with this id is already registered
    DuplicateReplica,

    /// Commit gate invariant violation surfaced while signaling
    CommitGate,

    /// Active transaction table rejected an operation
    TransactionTracking,
}

impl PrimaryError {
    /// Create a new primary-side error.
    pub fn new(kind: PrimaryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::new(PrimaryErrorKind::ConfigurationError, message)
    }

    /// Create a transport error.
    pub fn transport(err: &TransportError) -> Self {
        Self::new(PrimaryErrorKind::Transport, err.to_string())
    }

    /// Create a sequence-order error.
    pub fn sequence_order(message: impl Into<String>) -> Self {
        Self::new(PrimaryErrorKind::SequenceOrder, message)
    }

    /// Create a duplicate-replica error.
    pub fn duplicate_replica(message: impl Into<String>) -> Self {
        Self::new(PrimaryErrorKind::DuplicateReplica, message)
    }

    /// Check if this error is fatal (requires operator intervention).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            PrimaryErrorKind::SequenceOrder | PrimaryErrorKind::CommitGate
        )
    }
}

impl From<CommitError> for PrimaryError {
    fn from(err: CommitError) -> Self {
        Self::new(PrimaryErrorKind::CommitGate, err.to_string())
    }
}

impl From<TxnError> for PrimaryError {
    fn from(err: TxnError) -> Self {
        Self::new(PrimaryErrorKind::TransactionTracking, err.to_string())
    }
}

impl fmt::Display for PrimaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrimaryError({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for PrimaryError {}

/// Result type for primary-side operations
pub type PrimaryResult<T> = Result<T, PrimaryError>;
