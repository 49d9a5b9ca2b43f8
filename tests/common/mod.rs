//! Shared harness: a primary and in-process replicas wired over the
//! in-memory transport, with the acknowledgment path looped back into
//! the replication manager.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use shiplog::commit::{CommitGate, DurabilitySubsystem};
use shiplog::config::ReplicationConfig;
use shiplog::log::Record;
use shiplog::observability::Logger;
use shiplog::primary::{LogBatcher, ReplicaId, ReplicationManager};
use shiplog::replica::{
    AckSink, ApplyEngine, ReplicaError, ReplicaErrorKind, ReplicaResult,
    ReplicationLogProvider, StorageApply,
};
use shiplog::transport::{memory_pair, MemoryConnection, MessagePoll, ReplicationMessage};
use shiplog::txn::{ActiveTransactionTable, TransactionId};

pub const BOTH_SUBSYSTEMS: &[DurabilitySubsystem] = &[
    DurabilitySubsystem::WalFsync,
    DurabilitySubsystem::Replication,
];

/// Storage fake that keeps applied records in apply order.
/// Idempotent: a re-delivered record is a no-op.
#[derive(Debug, Default)]
pub struct MemStorage {
    pub applied: Vec<Record>,
}

impl StorageApply for MemStorage {
    fn apply(&mut self, record: &Record) -> ReplicaResult<()> {
        if !self.applied.contains(record) {
            self.applied.push(record.clone());
        }
        Ok(())
    }
}

/// One replica: transport endpoint, sequencing provider, apply engine.
pub struct TestReplica {
    pub id: ReplicaId,
    inbound: MemoryConnection,
    pub provider: ReplicationLogProvider,
    pub engine: ApplyEngine<MemStorage>,
}

impl TestReplica {
    /// Take the next delivered message, if any.
    pub fn poll_message(&self) -> Option<ReplicationMessage> {
        self.inbound.poll().unwrap()
    }

    /// Transactions applied to this replica's storage, in order.
    pub fn applied_txns(&self) -> Vec<TransactionId> {
        let mut txns = Vec::new();
        for record in &self.engine.storage().applied {
            if txns.last() != Some(&record.txn) {
                txns.push(record.txn);
            }
        }
        txns
    }
}

/// The primary side: transaction table, batcher, manager.
pub struct TestPrimary {
    pub table: Arc<ActiveTransactionTable>,
    pub batcher: LogBatcher,
    pub manager: ReplicationManager,
}

impl TestPrimary {
    pub fn new(config: ReplicationConfig) -> Self {
        let table = Arc::new(ActiveTransactionTable::new());
        let batcher = LogBatcher::new(config.batch, Arc::clone(&table), Logger::default());
        let manager = ReplicationManager::new(&config);
        Self {
            table,
            batcher,
            manager,
        }
    }

    /// Register a fresh replica over an in-memory connection.
    pub fn add_replica(&self) -> TestReplica {
        let (local, remote) = memory_pair();
        let id = Uuid::new_v4();
        self.manager.register_replica(id, Box::new(local)).unwrap();
        TestReplica {
            id,
            inbound: remote,
            provider: ReplicationLogProvider::new(Logger::default()),
            engine: ApplyEngine::new(MemStorage::default(), Logger::default()),
        }
    }

    /// Register a replica whose peer endpoint is already gone, so
    /// every send to it fails with a connection loss.
    pub fn add_dead_replica(&self) -> ReplicaId {
        let (local, remote) = memory_pair();
        drop(remote);
        let id = Uuid::new_v4();
        self.manager.register_replica(id, Box::new(local)).unwrap();
        id
    }

    /// Run one transaction to its commit record: begin, one redo
    /// record, commit with a gate that bumps `fired` when released.
    pub fn commit_txn(
        &mut self,
        payload: Vec<u8>,
        fired: &Arc<AtomicUsize>,
    ) -> TransactionId {
        let txn = self.table.begin();
        self.batcher.append_redo(txn, payload);
        self.batcher
            .append_commit(txn, counting_gate(txn, fired))
            .unwrap();
        txn
    }

    /// Seal the in-progress batch and dispatch it.
    pub fn flush(&mut self) {
        if let Some(sealed) = self.batcher.seal() {
            self.manager.dispatch(sealed).unwrap();
        }
    }

    /// One heartbeat tick: broadcast a standalone OAT notification if
    /// the idle stream owes one.
    pub fn heartbeat(&mut self) -> bool {
        match self.batcher.idle_notification() {
            Some(oat) => {
                self.manager.broadcast_oat(oat).unwrap();
                true
            }
            None => false,
        }
    }
}

/// Gate requiring WAL fsync and replication, counting firings.
pub fn counting_gate(txn: TransactionId, fired: &Arc<AtomicUsize>) -> Arc<CommitGate> {
    let counter = Arc::clone(fired);
    Arc::new(
        CommitGate::new(
            txn,
            BOTH_SUBSYSTEMS,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap(),
    )
}

/// AckSink that feeds TXN_APPLIED straight back into the manager,
/// closing the acknowledgment loop in-process.
pub struct AckLoop<'a> {
    manager: &'a ReplicationManager,
    replica: ReplicaId,
}

impl AckSink for AckLoop<'_> {
    fn txn_applied(&mut self, txn: TransactionId) -> ReplicaResult<()> {
        self.manager
            .on_txn_applied(self.replica, txn)
            .map(|_| ())
            .map_err(|e| ReplicaError::new(ReplicaErrorKind::AckSend, e.to_string()))
    }
}

/// Feed one wire message through the replica's sequencing and apply
/// stages, acknowledging back to the primary.
pub fn deliver(
    replica: &mut TestReplica,
    manager: &ReplicationManager,
    message: ReplicationMessage,
) -> ReplicaResult<()> {
    let mut acks = AckLoop {
        manager,
        replica: replica.id,
    };
    match message {
        ReplicationMessage::RecordsBatch(batch) => {
            replica.provider.on_batch_received(batch);
            while let Some(ready) = replica.provider.try_next() {
                replica.engine.process_batch(ready, &mut acks)?;
            }
        }
        ReplicationMessage::NotifyOat(oat) => {
            replica.engine.observe_oat(oat, &mut acks)?;
        }
        // Acknowledgments flow replica-to-primary only; a replica
        // receiving one would be a wiring mistake in the test.
        ReplicationMessage::TxnApplied(txn) => {
            panic!("replica received TXN_APPLIED for {}", txn)
        }
    }
    Ok(())
}

/// Drain the replica's inbound connection and apply everything that
/// becomes ready, acknowledging back to the primary.
pub fn pump(replica: &mut TestReplica, manager: &ReplicationManager) -> ReplicaResult<()> {
    loop {
        let message = match replica.inbound.poll().map_err(ReplicaError::from)? {
            Some(message) => message,
            None => return Ok(()),
        };
        deliver(replica, manager, message)?;
    }
}
