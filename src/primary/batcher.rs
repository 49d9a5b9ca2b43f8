//! Log batching stage
//!
//! Accumulates records produced by concurrently committing
//! transactions into a batch. The batching thread is the sole writer
//! until seal; after seal the batch is immutable.
//!
//! Per DEFERRED_APPLY.md §3:
//! - §3.1 every commit record is stamped with the freshest OAT value
//!   at seal time (piggyback path)
//! - §3.2 on an idle stream the batcher produces a standalone OAT
//!   notification, the liveness path for the last commits of a quiet
//!   period

use std::collections::HashMap;
use std::sync::Arc;

use crate::commit::CommitGate;
use crate::config::BatchConfig;
use crate::log::{Batch, Record};
use crate::observability::{Event, Logger};
use crate::txn::{ActiveTransactionTable, TransactionId};

use super::errors::{PrimaryError, PrimaryErrorKind, PrimaryResult};

/// A sealed batch paired with its callback manifest.
///
/// The manifest never reaches the wire: `ReplicationManager` strips
/// it before handing the `Batch` to the transport.
#[derive(Debug)]
pub struct SealedBatch {
    batch: Batch,
    manifest: HashMap<TransactionId, Arc<CommitGate>>,
}

impl SealedBatch {
    /// The wire-visible batch.
    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Transactions with a commit gate in this batch.
    pub fn manifest_len(&self) -> usize {
        self.manifest.len()
    }

    /// Split into the wire batch and the primary-side manifest.
    pub fn into_parts(self) -> (Batch, HashMap<TransactionId, Arc<CommitGate>>) {
        (self.batch, self.manifest)
    }
}

/// Accumulates records and seals them into sequence-numbered batches.
#[derive(Debug)]
pub struct LogBatcher {
    config: BatchConfig,
    /// Source of truth for the OAT value.
    oat_source: Arc<ActiveTransactionTable>,
    /// Sequence number the next sealed batch receives.
    next_sequence: u64,
    /// Records of the in-progress batch, in arrival order.
    records: Vec<Record>,
    /// Commit gates for committing transactions in this batch.
    manifest: HashMap<TransactionId, Arc<CommitGate>>,
    /// Accumulated redo payload bytes.
    payload_bytes: usize,
    /// Last OAT value published, via piggyback or idle notification.
    last_published_oat: Option<TransactionId>,
    log: Logger,
}

impl LogBatcher {
    /// Create a batcher starting at sequence 0.
    pub fn new(
        config: BatchConfig,
        oat_source: Arc<ActiveTransactionTable>,
        log: Logger,
    ) -> Self {
        Self {
            config,
            oat_source,
            next_sequence: 0,
            records: Vec::new(),
            manifest: HashMap::new(),
            payload_bytes: 0,
            last_published_oat: None,
            log,
        }
    }

    /// Append a redo record for a transaction.
    pub fn append_redo(&mut self, txn: TransactionId, payload: Vec<u8>) {
        let record = Record::redo(txn, payload);
        self.payload_bytes += record.payload_size();
        self.records.push(record);
    }

    /// Append a transaction's commit record and register its gate in
    /// the manifest. Marks the transaction fully serialized.
    pub fn append_commit(
        &mut self,
        txn: TransactionId,
        gate: Arc<CommitGate>,
    ) -> PrimaryResult<()> {
        if self.manifest.contains_key(&txn) {
            return Err(PrimaryError::new(
                PrimaryErrorKind::TransactionTracking,
                format!("{} already has a commit record in this batch", txn),
            ));
        }
        self.oat_source.serialized(txn)?;
        self.records.push(Record::commit(txn));
        self.manifest.insert(txn, gate);
        Ok(())
    }

    /// Append a transaction's abort record. Marks the transaction
    /// fully serialized; aborts carry no commit gate.
    pub fn append_abort(&mut self, txn: TransactionId) -> PrimaryResult<()> {
        self.oat_source.serialized(txn)?;
        self.records.push(Record::abort(txn));
        Ok(())
    }

    /// Whether the in-progress batch has reached a threshold.
    pub fn should_seal(&self) -> bool {
        self.records.len() >= self.config.max_records
            || self.payload_bytes >= self.config.max_bytes
    }

    /// Records accumulated so far.
    pub fn pending_records(&self) -> usize {
        self.records.len()
    }

    /// Redo payload bytes accumulated so far.
    pub fn pending_bytes(&self) -> usize {
        self.payload_bytes
    }

    /// Seal the in-progress batch.
    ///
    /// Assigns the next sequence number and stamps every commit
    /// record with the OAT value known at this instant. Returns
    /// `None` when nothing has been appended.
    pub fn seal(&mut self) -> Option<SealedBatch> {
        if self.records.is_empty() {
            return None;
        }

        let oat = self.oat_source.oldest_active();
        let mut records = std::mem::take(&mut self.records);
        let mut carries_oat = false;
        for record in &mut records {
            record.stamp_oat(oat);
            carries_oat |= record.piggybacked_oat().is_some();
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.payload_bytes = 0;
        // A batch without commit records publishes no OAT value; the
        // idle notification path still owes the replicas this advance.
        if carries_oat {
            self.last_published_oat = Some(oat);
        }

        let batch = Batch::new(sequence, records);
        self.log.info(
            Event::BatchSealed,
            &[
                ("sequence", &sequence.to_string()),
                ("records", &batch.len().to_string()),
                ("oat", &oat.to_string()),
            ],
        );

        Some(SealedBatch {
            batch,
            manifest: std::mem::take(&mut self.manifest),
        })
    }

    /// Produce a standalone OAT notification for an idle stream.
    ///
    /// Returns a value only when no batch is in progress, no
    /// transactions are active, and OAT has advanced past the last
    /// published value, so an idle stream costs at most one message
    /// per advance. Driven by the embedding engine's timer tick at
    /// the configured heartbeat interval.
    pub fn idle_notification(&mut self) -> Option<TransactionId> {
        if !self.records.is_empty() || self.oat_source.active_count() > 0 {
            return None;
        }

        let oat = self.oat_source.oldest_active();
        if self.last_published_oat.map_or(false, |last| oat <= last) {
            return None;
        }

        self.last_published_oat = Some(oat);
        self.log
            .info(Event::OatNotified, &[("oat", &oat.to_string())]);
        Some(oat)
    }
}
