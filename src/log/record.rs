//! Log record types
//!
//! Per REPLICATION_LOG_FLOW.md §2:
//! - Record kinds are a tagged variant with shared framing fields
//!   and per-kind payload; dispatch is by pattern match
//! - Redo payloads are opaque bytes, individually checksummed
//! - Commit records optionally carry a piggybacked OAT value
//!   (DEFERRED_APPLY.md §3.1)

use serde::{Deserialize, Serialize};

use crate::txn::TransactionId;

use super::errors::{LogError, LogResult};

/// Record kind discriminant, for dispatch and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Redo: an effect of the transaction, applied to storage
    Redo,
    /// Commit: the transaction's final record on the commit path
    Commit,
    /// Abort: the transaction's final record on the abort path
    Abort,
}

impl RecordKind {
    /// Returns the string representation
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Redo => "REDO",
            RecordKind::Commit => "COMMIT",
            RecordKind::Abort => "ABORT",
        }
    }
}

/// Per-kind record body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordBody {
    /// Opaque redo payload with its crc32 checksum.
    ///
    /// The payload encoding belongs to the storage engine; this layer
    /// only guarantees integrity (REPLICATION_LOG_FLOW.md §2.3).
    Redo { payload: Vec<u8>, checksum: u32 },

    /// Commit marker, stamped with the freshest OAT value when the
    /// containing batch is sealed (DEFERRED_APPLY.md §3.1).
    Commit { oat: Option<TransactionId> },

    /// Abort marker. The transaction's buffered records are discarded
    /// at sweep time (DEFERRED_APPLY.md §2.5).
    Abort,
}

/// A single log record.
///
/// Records of one transaction are never reordered relative to each
/// other; records of different transactions carry no ordering
/// guarantee (REPLICATION_LOG_FLOW.md §2.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Owning transaction.
    pub txn: TransactionId,
    /// Kind-specific body.
    pub body: RecordBody,
}

impl Record {
    /// Create a redo record, computing the payload checksum.
    pub fn redo(txn: TransactionId, payload: Vec<u8>) -> Self {
        let checksum = crc32fast::hash(&payload);
        Self {
            txn,
            body: RecordBody::Redo { payload, checksum },
        }
    }

    /// Create a commit record with no piggybacked OAT value yet.
    pub fn commit(txn: TransactionId) -> Self {
        Self {
            txn,
            body: RecordBody::Commit { oat: None },
        }
    }

    /// Create an abort record.
    pub fn abort(txn: TransactionId) -> Self {
        Self {
            txn,
            body: RecordBody::Abort,
        }
    }

    /// Kind discriminant of this record.
    pub fn kind(&self) -> RecordKind {
        match self.body {
            RecordBody::Redo { .. } => RecordKind::Redo,
            RecordBody::Commit { .. } => RecordKind::Commit,
            RecordBody::Abort => RecordKind::Abort,
        }
    }

    /// Whether this record ends its transaction's serialization.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind(), RecordKind::Commit | RecordKind::Abort)
    }

    /// The piggybacked OAT value, if this is a stamped commit record.
    pub fn piggybacked_oat(&self) -> Option<TransactionId> {
        match self.body {
            RecordBody::Commit { oat } => oat,
            _ => None,
        }
    }

    /// Stamp a commit record with an OAT value. No-op on other kinds.
    pub fn stamp_oat(&mut self, value: TransactionId) {
        if let RecordBody::Commit { ref mut oat } = self.body {
            *oat = Some(value);
        }
    }

    /// Payload size in bytes (zero for markers).
    pub fn payload_size(&self) -> usize {
        match &self.body {
            RecordBody::Redo { payload, .. } => payload.len(),
            _ => 0,
        }
    }

    /// Verify payload integrity.
    ///
    /// Per REPLICATION_LOG_FLOW.md §2.3: mismatch is fatal to the
    /// connection.
    pub fn verify(&self) -> LogResult<()> {
        if let RecordBody::Redo { payload, checksum } = &self.body {
            let actual = crc32fast::hash(payload);
            if actual != *checksum {
                return Err(LogError::checksum_mismatch(self.txn, *checksum, actual));
            }
        }
        Ok(())
    }
}
