//! Recovery / apply engine
//!
//! Per DEFERRED_APPLY.md §2:
//! - §2.1 records are never applied on arrival; batch order says
//!   nothing about cross-transaction order
//! - §2.2 after every OAT advance, buffered transactions strictly
//!   below the watermark are applied in ascending start order,
//!   records in recorded order, then acknowledged and discarded
//! - §2.4 a storage failure stops the sweep: no acknowledgment, no
//!   discard, and the watermark does not advance past the failure
//!
//! Receipt is not application: acknowledging on receipt is the prior
//! failure mode this engine exists to avoid
//! (REPLICATION_LOG_FLOW.md §5.1).

use std::collections::BTreeMap;

use crate::log::{Batch, Record, RecordKind};
use crate::observability::{Event, Logger};
use crate::transport::{Messenger, ReplicationMessage};
use crate::txn::{OatWatermark, TransactionId};

use super::errors::{ReplicaError, ReplicaResult};

/// Storage-engine seam: applies one record.
///
/// Apply must be idempotent for identical record content, because
/// re-delivery after a connection hiccup may replay records.
pub trait StorageApply {
    /// Apply a record to storage.
    fn apply(&mut self, record: &Record) -> ReplicaResult<()>;
}

/// Acknowledgment seam: reports a fully-applied transaction back to
/// the primary.
pub trait AckSink {
    /// Emit TXN_APPLIED for a transaction.
    fn txn_applied(&mut self, txn: TransactionId) -> ReplicaResult<()>;
}

/// AckSink over any outbound connection.
pub struct MessengerAckSink<'a> {
    messenger: &'a dyn Messenger,
}

impl<'a> MessengerAckSink<'a> {
    /// Wrap an outbound connection.
    pub fn new(messenger: &'a dyn Messenger) -> Self {
        Self { messenger }
    }
}

impl AckSink for MessengerAckSink<'_> {
    fn txn_applied(&mut self, txn: TransactionId) -> ReplicaResult<()> {
        self.messenger
            .send(ReplicationMessage::TxnApplied(txn))
            .map_err(ReplicaError::from)
    }
}

/// Replica-local view of a transaction's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnApplyState {
    /// No record seen and the watermark has not passed it.
    Unknown,
    /// Records buffered, waiting for OAT clearance.
    Buffering,
    /// The watermark passed it: applied, or aborted, or it never
    /// produced a record on this stream. All three are final.
    Applied,
}

/// Counters for observability, in the spirit of replay statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    /// Batches processed.
    pub batches_processed: u64,
    /// Records deferred into transaction buffers.
    pub records_deferred: u64,
    /// Transactions fully applied to storage.
    pub txns_applied: u64,
    /// Aborted transactions discarded without storage calls.
    pub txns_aborted: u64,
    /// Times the OAT watermark moved.
    pub oat_advances: u64,
}

/// Result of one apply sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Transactions applied by this sweep, in apply order.
    pub applied: Vec<TransactionId>,
    /// Watermark after the sweep.
    pub oat: TransactionId,
}

/// Buffered records of one transaction, pending OAT clearance.
#[derive(Debug, Default)]
struct DeferredTransaction {
    /// Records in arrival order, a contiguous prefix of the
    /// transaction's own serialization order.
    records: Vec<Record>,
    /// The transaction ended in an abort record.
    aborted: bool,
}

/// Consumes ready batches and applies transactions once the OAT
/// watermark clears them.
///
/// Owned by the recovery thread of one replica connection; nothing
/// here is shared.
#[derive(Debug)]
pub struct ApplyEngine<S: StorageApply> {
    storage: S,
    oat: OatWatermark,
    /// BTreeMap so the sweep visits transactions in ascending start
    /// order.
    deferred: BTreeMap<TransactionId, DeferredTransaction>,
    stats: ApplyStats,
    log: Logger,
}

impl<S: StorageApply> ApplyEngine<S> {
    /// Create an engine over a storage seam.
    pub fn new(storage: S, log: Logger) -> Self {
        Self {
            storage,
            oat: OatWatermark::genesis(),
            deferred: BTreeMap::new(),
            stats: ApplyStats::default(),
            log,
        }
    }

    /// Process one ready batch: verify integrity, defer every
    /// record, fold in piggybacked OAT values, then sweep.
    pub fn process_batch(
        &mut self,
        batch: Batch,
        acks: &mut dyn AckSink,
    ) -> ReplicaResult<SweepReport> {
        batch.verify_integrity()?;

        let mut freshest_oat = None;
        for record in batch.records {
            if let Some(oat) = record.piggybacked_oat() {
                freshest_oat = freshest_oat.max(Some(oat));
            }

            let entry = self.deferred.entry(record.txn).or_default();
            match record.kind() {
                RecordKind::Abort => entry.aborted = true,
                RecordKind::Redo | RecordKind::Commit => entry.records.push(record),
            }
            self.stats.records_deferred += 1;
        }
        self.stats.batches_processed += 1;

        // No piggybacked value still sweeps at the current watermark:
        // re-delivered records of already-cleared transactions must
        // not linger.
        let candidate = freshest_oat.unwrap_or(self.oat.value());
        self.advance_and_sweep(candidate, acks)
    }

    /// Handle a standalone NOTIFY_OAT (DEFERRED_APPLY.md §3.2).
    pub fn observe_oat(
        &mut self,
        value: TransactionId,
        acks: &mut dyn AckSink,
    ) -> ReplicaResult<SweepReport> {
        self.advance_and_sweep(value, acks)
    }

    /// Advance toward a candidate watermark and apply everything it
    /// clears.
    ///
    /// The watermark itself is committed only after the whole sweep
    /// succeeds (DEFERRED_APPLY.md §2.4), so a storage failure leaves
    /// it at the pre-sweep value and the failed transaction's buffer
    /// intact; a retry re-runs the same sweep against idempotent
    /// storage.
    fn advance_and_sweep(
        &mut self,
        candidate: TransactionId,
        acks: &mut dyn AckSink,
    ) -> ReplicaResult<SweepReport> {
        let target = self.oat.value().max(candidate);
        let mut applied = Vec::new();

        loop {
            let txn = match self.deferred.first_key_value() {
                Some((&txn, _)) if txn < target => txn,
                _ => break,
            };
            // Removed up front so storage and the buffer can be
            // touched independently; re-inserted untouched on failure.
            let entry = match self.deferred.remove(&txn) {
                Some(entry) => entry,
                None => break,
            };

            if entry.aborted {
                self.stats.txns_aborted += 1;
                self.log
                    .info(Event::TxnAborted, &[("txn", &txn.to_string())]);
                continue;
            }

            let mut failure = None;
            for record in &entry.records {
                if let Err(err) = self.storage.apply(record) {
                    failure = Some(err);
                    break;
                }
            }
            let failure = failure.or_else(|| acks.txn_applied(txn).err());
            if let Some(err) = failure {
                self.log.error(
                    Event::ApplyFailed,
                    &[("error", &err.to_string()), ("txn", &txn.to_string())],
                );
                self.deferred.insert(txn, entry);
                return Err(err);
            }

            let record_count = entry.records.len();
            self.stats.txns_applied += 1;
            self.log.info(
                Event::TxnApplied,
                &[
                    ("records", &record_count.to_string()),
                    ("txn", &txn.to_string()),
                ],
            );
            applied.push(txn);
        }

        if self.oat.advance_to(target) {
            self.stats.oat_advances += 1;
            self.log
                .trace(Event::OatAdvanced, &[("oat", &target.to_string())]);
        }

        Ok(SweepReport {
            applied,
            oat: self.oat.value(),
        })
    }

    /// Replica-local lifecycle state of a transaction.
    pub fn state(&self, txn: TransactionId) -> TxnApplyState {
        if self.deferred.contains_key(&txn) {
            TxnApplyState::Buffering
        } else if self.oat.clears(txn) {
            TxnApplyState::Applied
        } else {
            TxnApplyState::Unknown
        }
    }

    /// The storage seam, for inspection.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Current OAT watermark.
    pub fn oat(&self) -> TransactionId {
        self.oat.value()
    }

    /// Transactions currently buffered.
    pub fn buffered_transactions(&self) -> usize {
        self.deferred.len()
    }

    /// Counters.
    pub fn stats(&self) -> ApplyStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Storage fake that records apply order and can be told to
    /// reject a transaction's records.
    #[derive(Debug, Default)]
    struct FakeStorage {
        applied: Vec<Record>,
        reject: Option<TransactionId>,
    }

    impl StorageApply for FakeStorage {
        fn apply(&mut self, record: &Record) -> ReplicaResult<()> {
            if self.reject == Some(record.txn) {
                return Err(ReplicaError::storage_apply(record.txn, "rejected"));
            }
            self.applied.push(record.clone());
            Ok(())
        }
    }

    impl AckSink for Vec<TransactionId> {
        fn txn_applied(&mut self, txn: TransactionId) -> ReplicaResult<()> {
            self.push(txn);
            Ok(())
        }
    }

    fn engine() -> ApplyEngine<FakeStorage> {
        ApplyEngine::new(FakeStorage::default(), Logger::default())
    }

    fn commit_with_oat(txn: TransactionId, oat: u64) -> Record {
        let mut record = Record::commit(txn);
        record.stamp_oat(TransactionId::new(oat));
        record
    }

    // ==================== Deferral Tests ====================

    #[test]
    fn test_records_deferred_not_applied_eagerly() {
        let mut engine = engine();
        let mut acks = Vec::new();
        let t1 = TransactionId::new(1);

        // No OAT value: nothing may apply
        let batch = Batch::new(0, vec![Record::redo(t1, vec![1])]);
        let report = engine.process_batch(batch, &mut acks).unwrap();

        assert!(report.applied.is_empty());
        assert!(engine.storage.applied.is_empty());
        assert_eq!(engine.state(t1), TxnApplyState::Buffering);
        assert!(acks.is_empty());
    }

    #[test]
    fn test_commit_oat_clears_earlier_transactions() {
        let mut engine = engine();
        let mut acks = Vec::new();
        let t1 = TransactionId::new(1);
        let t2 = TransactionId::new(2);

        let batch = Batch::new(
            0,
            vec![
                Record::redo(t2, b"b".to_vec()),
                Record::redo(t1, b"a".to_vec()),
                commit_with_oat(t1, 3),
                commit_with_oat(t2, 3),
            ],
        );
        let report = engine.process_batch(batch, &mut acks).unwrap();

        // Applied in start-time order despite arrival order
        assert_eq!(report.applied, vec![t1, t2]);
        assert_eq!(acks, vec![t1, t2]);
        assert_eq!(engine.storage.applied[0].txn, t1);
        assert_eq!(engine.state(t1), TxnApplyState::Applied);
        assert_eq!(engine.oat(), TransactionId::new(3));
    }

    #[test]
    fn test_per_transaction_record_order_preserved() {
        let mut engine = engine();
        let mut acks = Vec::new();
        let t1 = TransactionId::new(1);

        let batch = Batch::new(
            0,
            vec![
                Record::redo(t1, b"first".to_vec()),
                Record::redo(t1, b"second".to_vec()),
                commit_with_oat(t1, 2),
            ],
        );
        engine.process_batch(batch, &mut acks).unwrap();

        let payloads: Vec<usize> = engine
            .storage
            .applied
            .iter()
            .map(Record::payload_size)
            .collect();
        assert_eq!(payloads, vec![5, 6, 0]); // first, second, commit
    }

    #[test]
    fn test_transaction_at_watermark_stays_buffered() {
        let mut engine = engine();
        let mut acks = Vec::new();
        let t2 = TransactionId::new(2);

        let batch = Batch::new(0, vec![Record::redo(t2, vec![1]), commit_with_oat(t2, 2)]);
        engine.process_batch(batch, &mut acks).unwrap();

        // OAT == start(t2): strictly-less-than keeps it deferred
        assert_eq!(engine.state(t2), TxnApplyState::Buffering);
        assert!(acks.is_empty());
    }

    // ==================== OAT Tests ====================

    #[test]
    fn test_notify_oat_releases_buffered_transaction() {
        let mut engine = engine();
        let mut acks = Vec::new();
        let t5 = TransactionId::new(5);

        let batch = Batch::new(0, vec![Record::redo(t5, vec![1]), commit_with_oat(t5, 5)]);
        engine.process_batch(batch, &mut acks).unwrap();
        assert_eq!(engine.state(t5), TxnApplyState::Buffering);

        // Heartbeat arrives with no further batches ever
        let report = engine.observe_oat(TransactionId::new(6), &mut acks).unwrap();
        assert_eq!(report.applied, vec![t5]);
        assert_eq!(acks, vec![t5]);
    }

    #[test]
    fn test_oat_never_regresses() {
        let mut engine = engine();
        let mut acks = Vec::new();

        engine.observe_oat(TransactionId::new(9), &mut acks).unwrap();
        engine.observe_oat(TransactionId::new(4), &mut acks).unwrap();

        assert_eq!(engine.oat(), TransactionId::new(9));
        assert_eq!(engine.stats().oat_advances, 1);
    }

    #[test]
    fn test_stale_oat_still_sweeps_redelivered_records() {
        let mut engine = engine();
        let mut acks = Vec::new();
        let t1 = TransactionId::new(1);

        engine.observe_oat(TransactionId::new(5), &mut acks).unwrap();

        // Re-delivery of an already-cleared transaction's records,
        // with no fresh OAT value anywhere in the batch
        let batch = Batch::new(7, vec![Record::redo(t1, vec![1]), Record::commit(t1)]);
        let report = engine.process_batch(batch, &mut acks).unwrap();

        // Swept immediately at the current watermark; storage
        // idempotence makes the re-apply a no-op
        assert_eq!(report.applied, vec![t1]);
    }

    // ==================== Abort Tests ====================

    #[test]
    fn test_aborted_transaction_discarded_without_storage() {
        let mut engine = engine();
        let mut acks = Vec::new();
        let t1 = TransactionId::new(1);

        let batch = Batch::new(0, vec![Record::redo(t1, vec![1]), Record::abort(t1)]);
        engine.process_batch(batch, &mut acks).unwrap();
        engine.observe_oat(TransactionId::new(2), &mut acks).unwrap();

        assert!(engine.storage.applied.is_empty());
        assert!(acks.is_empty());
        assert_eq!(engine.stats().txns_aborted, 1);
        assert_eq!(engine.buffered_transactions(), 0);
    }

    // ==================== Failure Tests ====================

    #[test]
    fn test_apply_failure_keeps_buffer_and_watermark() {
        let mut engine = engine();
        engine.storage.reject = Some(TransactionId::new(1));
        let mut acks = Vec::new();
        let t1 = TransactionId::new(1);

        let batch = Batch::new(0, vec![Record::redo(t1, vec![1]), commit_with_oat(t1, 2)]);
        let err = engine.process_batch(batch, &mut acks).unwrap_err();

        assert!(err.is_fatal());
        // No acknowledgment, buffer intact, watermark unmoved
        assert!(acks.is_empty());
        assert_eq!(engine.state(t1), TxnApplyState::Buffering);
        assert_eq!(engine.oat(), TransactionId::new(0));

        // Storage recovers: the same advance replays cleanly
        engine.storage.reject = None;
        let report = engine.observe_oat(TransactionId::new(2), &mut acks).unwrap();
        assert_eq!(report.applied, vec![t1]);
        assert_eq!(acks, vec![t1]);
    }

    #[test]
    fn test_corrupted_batch_rejected_before_deferral() {
        let mut engine = engine();
        let mut acks = Vec::new();
        let t1 = TransactionId::new(1);

        let mut batch = Batch::new(0, vec![Record::redo(t1, b"data".to_vec())]);
        if let crate::log::RecordBody::Redo { ref mut payload, .. } =
            batch.records[0].body
        {
            payload[0] ^= 0xff;
        }

        let err = engine.process_batch(batch, &mut acks).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(engine.buffered_transactions(), 0);
    }

    // ==================== Head-of-Line Tests ====================

    #[test]
    fn test_long_running_transaction_does_not_block_younger() {
        let mut engine = engine();
        let mut acks = Vec::new();
        let long = TransactionId::new(1);

        // The long transaction streams records across many batches
        // without committing; each younger transaction commits in its
        // own batch with OAT pinned at the long transaction's start.
        for i in 0..100u64 {
            let young = TransactionId::new(2 + i);
            let batch = Batch::new(
                i,
                vec![
                    Record::redo(long, vec![i as u8]),
                    Record::redo(young, vec![i as u8]),
                    commit_with_oat(young, 1),
                ],
            );
            engine.process_batch(batch, &mut acks).unwrap();
        }

        // OAT pinned at the long transaction: nothing applies yet,
        // but nothing is lost either
        assert!(acks.is_empty());
        assert_eq!(engine.buffered_transactions(), 101);

        // The long transaction finally commits; OAT sails past all
        let batch = Batch::new(100, vec![commit_with_oat(long, 102)]);
        let report = engine.process_batch(batch, &mut acks).unwrap();

        // Everyone applies, oldest first
        assert_eq!(report.applied.len(), 101);
        assert_eq!(report.applied[0], long);
        assert_eq!(engine.stats().txns_applied, 101);
        assert_eq!(engine.buffered_transactions(), 0);
    }
}
