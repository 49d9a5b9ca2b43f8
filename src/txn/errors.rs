//! Transaction Tracking Error Types

use std::fmt;

use super::TransactionId;

/// Transaction tracking error type
#[derive(Debug, Clone)]
pub struct TxnError {
    /// Error kind
    pub kind: TxnErrorKind,
    /// Error message
    pub message: String,
}

/// Transaction tracking error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnErrorKind {
    /// Transaction is not in the active table
    UnknownTransaction,

    /// Transaction was already marked fully serialized
    AlreadySerialized,
}

impl TxnError {
    /// Create a new transaction tracking error.
    pub fn new(kind: TxnErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create an unknown transaction error.
    pub fn unknown_transaction(txn: TransactionId) -> Self {
        Self::new(
            TxnErrorKind::UnknownTransaction,
            format!("{} is not active", txn),
        )
    }

    /// Create an already-serialized error.
    pub fn already_serialized(txn: TransactionId) -> Self {
        Self::new(
            TxnErrorKind::AlreadySerialized,
            format!("{} was already marked serialized", txn),
        )
    }
}

impl fmt::Display for TxnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxnError({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for TxnError {}

/// Result type for transaction tracking operations
pub type TxnResult<T> = Result<T, TxnError>;
