//! Transaction Identity and OAT Tracking
//!
//! Per DEFERRED_APPLY.md §1:
//! - Transactions are totally ordered by a monotonically increasing
//!   start time
//! - OAT is the smallest start time among transactions not yet fully
//!   serialized
//! - OAT never decreases over the lifetime of a stream

mod active;
mod errors;
mod oat;

pub use active::ActiveTransactionTable;
pub use errors::{TxnError, TxnErrorKind, TxnResult};
pub use oat::OatWatermark;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transaction identifier, ordered by start time.
///
/// The start time is the deferral key and the OAT comparison key.
/// Identifiers are opaque to replicas: a replica only ever compares
/// them, it never derives one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Create a transaction id from a start time.
    pub const fn new(start_time: u64) -> Self {
        Self(start_time)
    }

    /// The start time this id is ordered by.
    pub const fn start_time(self) -> u64 {
        self.0
    }

    /// The id immediately following this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}
