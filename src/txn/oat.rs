//! OAT Watermark
//!
//! Per DEFERRED_APPLY.md §1.3:
//! - OAT is monotonically non-decreasing
//! - A received value folds in as max(current, received)

use super::TransactionId;

/// Monotonic Oldest-Active-Transaction watermark.
///
/// Per DEFERRED_APPLY.md §1.2: any transaction with start time
/// strictly below the watermark has been fully serialized and is
/// safe to apply in full wherever its records have been received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OatWatermark {
    current: TransactionId,
}

impl OatWatermark {
    /// Create a watermark at a starting value.
    pub fn new(start: TransactionId) -> Self {
        Self { current: start }
    }

    /// Genesis watermark: nothing is cleared yet.
    pub fn genesis() -> Self {
        Self::new(TransactionId::new(0))
    }

    /// Current watermark value.
    pub fn value(&self) -> TransactionId {
        self.current
    }

    /// Fold in a received OAT value.
    ///
    /// Returns true if the watermark moved. A stale (lower) value is
    /// absorbed silently; regression is impossible by construction.
    pub fn advance_to(&mut self, received: TransactionId) -> bool {
        if received > self.current {
            self.current = received;
            true
        } else {
            false
        }
    }

    /// Whether the watermark clears a transaction for apply.
    ///
    /// Strictly-less-than: a transaction at the watermark may still
    /// be producing records.
    pub fn clears(&self, txn: TransactionId) -> bool {
        txn < self.current
    }
}
