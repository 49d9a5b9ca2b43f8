//! Commit Gate Error Types
//!
//! Double signals and signals from subsystems outside the required
//! set are programming invariant violations: detection is mandatory,
//! recovery is not attempted.

use std::fmt;

use crate::txn::TransactionId;

use super::gate::DurabilitySubsystem;

/// Commit gate error type
#[derive(Debug, Clone)]
pub struct CommitError {
    /// Error kind
    pub kind: CommitErrorKind,
    /// Error message
    pub message: String,
}

/// Commit gate error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitErrorKind {
    /// A subsystem signaled the same gate twice
    DoubleSignal,

    /// A subsystem outside the required set signaled
    UnexpectedSignal,

    /// No gate is registered for the transaction
    UnknownTransaction,

    /// A gate is already registered for the transaction
    DuplicateRegistration,

    /// Gate constructed with an empty required set
    EmptyRequiredSet,
}

impl CommitError {
    /// Create a new commit gate error.
    pub fn new(kind: CommitErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a double-signal error.
    pub fn double_signal(txn: TransactionId, subsystem: DurabilitySubsystem) -> Self {
        Self::new(
            CommitErrorKind::DoubleSignal,
            format!("{} signaled {} more than once", subsystem.as_str(), txn),
        )
    }

    /// Create an unexpected-signal error.
    pub fn unexpected_signal(txn: TransactionId, subsystem: DurabilitySubsystem) -> Self {
        Self::new(
            CommitErrorKind::UnexpectedSignal,
            format!("{} is not required for {}", subsystem.as_str(), txn),
        )
    }

    /// Create an unknown-transaction error.
    pub fn unknown_transaction(txn: TransactionId) -> Self {
        Self::new(
            CommitErrorKind::UnknownTransaction,
            format!("no commit gate registered for {}", txn),
        )
    }

    /// Create a duplicate-registration error.
    pub fn duplicate_registration(txn: TransactionId) -> Self {
        Self::new(
            CommitErrorKind::DuplicateRegistration,
            format!("commit gate already registered for {}", txn),
        )
    }

    /// Create an empty-required-set error.
    pub fn empty_required_set(txn: TransactionId) -> Self {
        Self::new(
            CommitErrorKind::EmptyRequiredSet,
            format!("commit gate for {} requires at least one signal", txn),
        )
    }

    /// Check if this error is an invariant violation.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self.kind,
            CommitErrorKind::DoubleSignal | CommitErrorKind::UnexpectedSignal
        )
    }
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitError({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for CommitError {}

/// Result type for commit gate operations
pub type CommitResult<T> = Result<T, CommitError>;
