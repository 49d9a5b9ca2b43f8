//! Active Transaction Table
//!
//! Primary-side source of truth for the OAT value.
//!
//! Per DEFERRED_APPLY.md §1.1:
//! - A transaction is fully serialized once its last record (commit
//!   or abort) has been handed to the batching stage
//! - OAT is the smallest start time among transactions not yet fully
//!   serialized
//!
//! Read-only transactions never serialize records, so they never
//! enter this table (DEFERRED_APPLY.md §3.3).

use std::collections::BTreeSet;
use std::sync::Mutex;

use super::errors::{TxnError, TxnResult};
use super::TransactionId;

/// Tracks transactions between begin and full serialization.
///
/// Shared by transaction-execution contexts (which call `begin`) and
/// the batching stage (which calls `serialized` and reads
/// `oldest_active`), so the state lives behind one mutex.
#[derive(Debug)]
pub struct ActiveTransactionTable {
    inner: Mutex<TableInner>,
}

#[derive(Debug)]
struct TableInner {
    /// Next start time to assign.
    next_start: u64,
    /// Start times of transactions not yet fully serialized.
    active: BTreeSet<TransactionId>,
}

impl ActiveTransactionTable {
    /// Create an empty table. Start times begin at 1 so the genesis
    /// watermark value 0 never names a real transaction.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TableInner {
                next_start: 1,
                active: BTreeSet::new(),
            }),
        }
    }

    /// Begin a transaction: assign the next start time and track it
    /// as active.
    pub fn begin(&self) -> TransactionId {
        let mut inner = self.inner.lock().unwrap();
        let txn = TransactionId::new(inner.next_start);
        inner.next_start += 1;
        inner.active.insert(txn);
        txn
    }

    /// Mark a transaction fully serialized: its last record has been
    /// handed to the batching stage.
    pub fn serialized(&self, txn: TransactionId) -> TxnResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if txn.start_time() >= inner.next_start {
            return Err(TxnError::unknown_transaction(txn));
        }
        if !inner.active.remove(&txn) {
            return Err(TxnError::already_serialized(txn));
        }
        Ok(())
    }

    /// Current OAT value.
    ///
    /// With no active transactions this is the next start time: every
    /// assigned transaction is fully serialized, so all of them clear.
    pub fn oldest_active(&self) -> TransactionId {
        let inner = self.inner.lock().unwrap();
        inner
            .active
            .first()
            .copied()
            .unwrap_or(TransactionId::new(inner.next_start))
    }

    /// Number of transactions not yet fully serialized.
    pub fn active_count(&self) -> usize {
        self.inner.lock().unwrap().active.len()
    }
}

impl Default for ActiveTransactionTable {
    fn default() -> Self {
        Self::new()
    }
}
