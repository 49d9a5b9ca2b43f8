//! Sequence-numbered record batches
//!
//! Per REPLICATION_LOG_FLOW.md §3.1:
//! - Batch sequence numbers are strictly increasing per
//!   primary-to-replica stream, with no gaps on a healthy stream
//!
//! The primary-side callback manifest is deliberately not part of
//! this type: `primary::SealedBatch` pairs a `Batch` with its
//! manifest, so the manifest cannot reach the wire by construction.

use serde::{Deserialize, Serialize};

use crate::txn::TransactionId;

use super::errors::LogResult;
use super::record::Record;

/// A sequence-numbered group of records, the unit of network
/// transfer.
///
/// Immutable after sealing: the batching stage is the sole writer
/// until handoff, after which the batch is safely shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Stream position, assigned by the primary at seal time.
    pub sequence: u64,
    /// Records in production order per transaction.
    pub records: Vec<Record>,
}

impl Batch {
    /// Create a batch from sealed records.
    pub fn new(sequence: u64, records: Vec<Record>) -> Self {
        Self { sequence, records }
    }

    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch carries no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total redo payload bytes.
    pub fn payload_bytes(&self) -> usize {
        self.records.iter().map(Record::payload_size).sum()
    }

    /// The highest OAT value piggybacked on any commit record in
    /// this batch, if any.
    pub fn piggybacked_oat(&self) -> Option<TransactionId> {
        self.records
            .iter()
            .filter_map(Record::piggybacked_oat)
            .max()
    }

    /// Verify every record's payload checksum.
    ///
    /// Per REPLICATION_LOG_FLOW.md §2.3: the first mismatch is
    /// returned and is fatal to the connection.
    pub fn verify_integrity(&self) -> LogResult<()> {
        for record in &self.records {
            record.verify()?;
        }
        Ok(())
    }
}
