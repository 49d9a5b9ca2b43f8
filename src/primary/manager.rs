//! Primary replication manager
//!
//! Per REPLICATION_LOG_FLOW.md §4:
//! - §4.1 batches go to each replica in increasing sequence order,
//!   never re-sent or reordered
//! - §4.2 asynchronous mode signals the replication contribution on
//!   transport handoff
//! - §4.3 synchronous mode holds the callback manifest in a pending
//!   table until the acknowledgment policy is satisfied; the primary
//!   never fabricates an acknowledgment
//!
//! The pending table is the one piece of primary state shared across
//! replica connections: any replica's acknowledgment may release a
//! gate, so it lives behind its own mutex.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::commit::{CommitGate, DurabilitySubsystem};
use crate::config::{AckPolicy, ReplicationConfig, ReplicationMode};
use crate::observability::{Event, Logger};
use crate::transport::{Messenger, ReplicationMessage};
use crate::txn::TransactionId;

use super::batcher::SealedBatch;
use super::errors::{PrimaryError, PrimaryResult};

/// Replica identity, assigned at registration.
pub type ReplicaId = Uuid;

/// Outcome of an acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckProgress {
    /// Not waiting on this transaction (stale, duplicate, or
    /// asynchronous-mode dispatch).
    Ignored,
    /// Recorded; more acknowledgments are required.
    Recorded { outstanding: usize },
    /// Policy satisfied; the gate's replication contribution fired.
    Released,
}

/// One registered replica connection.
struct ReplicaLink {
    id: ReplicaId,
    messenger: Box<dyn Messenger>,
    /// Sequence of the last batch handed to this replica's transport.
    last_sequence: Option<u64>,
}

/// Synchronous-mode bookkeeping for one committing transaction.
struct PendingAck {
    gate: Arc<CommitGate>,
    acked: HashSet<ReplicaId>,
    required: usize,
}

/// Dispatches sealed batches and tracks replica acknowledgments.
pub struct ReplicationManager {
    mode: ReplicationMode,
    ack_policy: AckPolicy,
    replicas: Mutex<Vec<ReplicaLink>>,
    pending: Mutex<HashMap<TransactionId, PendingAck>>,
    log: Logger,
}

impl ReplicationManager {
    /// Create a manager from configuration.
    pub fn new(config: &ReplicationConfig) -> Self {
        Self {
            mode: config.mode,
            ack_policy: config.ack_policy,
            replicas: Mutex::new(Vec::new()),
            pending: Mutex::new(HashMap::new()),
            log: Logger::new(config.log),
        }
    }

    /// Register a replica connection.
    pub fn register_replica(
        &self,
        id: ReplicaId,
        messenger: Box<dyn Messenger>,
    ) -> PrimaryResult<()> {
        let mut replicas = self.replicas.lock().unwrap();
        if replicas.iter().any(|link| link.id == id) {
            return Err(PrimaryError::duplicate_replica(format!(
                "replica {} is already registered",
                id
            )));
        }
        replicas.push(ReplicaLink {
            id,
            messenger,
            last_sequence: None,
        });
        Ok(())
    }

    /// Number of registered replicas.
    pub fn replica_count(&self) -> usize {
        self.replicas.lock().unwrap().len()
    }

    /// Dispatch a sealed batch to every replica.
    ///
    /// The callback manifest is stripped before the wire. Mode
    /// decides what happens to it: asynchronous signals on handoff,
    /// synchronous parks it in the pending table.
    ///
    /// Synchronous entries are parked BEFORE transport handoff: an
    /// acknowledgment can arrive as soon as the first replica owns
    /// the batch, and a send failure must leave the commits visible
    /// in the pending table, not drop their gates. A dead replica
    /// does not stop the handoff loop either; the survivors still
    /// receive the batch and may satisfy the acknowledgment policy.
    /// The first transport failure is reported after the loop.
    pub fn dispatch(&self, sealed: SealedBatch) -> PrimaryResult<()> {
        let (batch, manifest) = sealed.into_parts();
        let mut replicas = self.replicas.lock().unwrap();

        // Validate the whole replica set before any send or parking,
        // so a sequence violation has no partial effects.
        for link in replicas.iter() {
            if let Some(last) = link.last_sequence {
                if batch.sequence <= last {
                    return Err(PrimaryError::sequence_order(format!(
                        "batch {} already sent to replica {} (last {})",
                        batch.sequence, link.id, last
                    )));
                }
            }
        }

        let required = match self.mode {
            ReplicationMode::Synchronous => {
                self.ack_policy.required_acks(replicas.len())
            }
            // Asynchronous never waits; the degenerate synchronous
            // case (zero required acks) takes the same signal path.
            ReplicationMode::Asynchronous => 0,
        };

        let to_signal = if required > 0 {
            let mut pending = self.pending.lock().unwrap();
            for (txn, gate) in manifest {
                pending.insert(
                    txn,
                    PendingAck {
                        gate,
                        acked: HashSet::new(),
                        required,
                    },
                );
            }
            HashMap::new()
        } else {
            manifest
        };

        let mut first_failure = None;
        for link in replicas.iter_mut() {
            match link
                .messenger
                .send(ReplicationMessage::RecordsBatch(batch.clone()))
            {
                Ok(()) => {
                    link.last_sequence = Some(batch.sequence);
                    self.log.trace(
                        Event::BatchDispatched,
                        &[
                            ("replica", &link.id.to_string()),
                            ("sequence", &batch.sequence.to_string()),
                        ],
                    );
                }
                Err(e) => {
                    if first_failure.is_none() {
                        first_failure = Some(PrimaryError::transport(&e));
                    }
                }
            }
        }
        drop(replicas);

        // Signal outside the replicas lock: the gate's action may be
        // arbitrary caller code.
        let mode_label = match self.mode {
            ReplicationMode::Asynchronous => "async",
            ReplicationMode::Synchronous => "sync",
        };
        for (txn, gate) in to_signal {
            gate.signal(DurabilitySubsystem::Replication)?;
            self.log.trace(
                Event::ReplicationSignaled,
                &[("mode", mode_label), ("txn", &txn.to_string())],
            );
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Broadcast a standalone OAT notification.
    pub fn broadcast_oat(&self, oat: TransactionId) -> PrimaryResult<()> {
        let replicas = self.replicas.lock().unwrap();
        for link in replicas.iter() {
            link.messenger
                .send(ReplicationMessage::NotifyOat(oat))
                .map_err(|e| PrimaryError::transport(&e))?;
        }
        Ok(())
    }

    /// Handle a replica's TXN_APPLIED acknowledgment.
    ///
    /// Per REPLICATION_LOG_FLOW.md §5.2: idempotent; acknowledgments
    /// for transactions the primary is not waiting on are ignored.
    pub fn on_txn_applied(
        &self,
        replica: ReplicaId,
        txn: TransactionId,
    ) -> PrimaryResult<AckProgress> {
        {
            let replicas = self.replicas.lock().unwrap();
            if !replicas.iter().any(|link| link.id == replica) {
                return Ok(AckProgress::Ignored);
            }
        }

        let released_gate = {
            let mut pending = self.pending.lock().unwrap();
            let Some(entry) = pending.get_mut(&txn) else {
                return Ok(AckProgress::Ignored);
            };
            if !entry.acked.insert(replica) {
                return Ok(AckProgress::Ignored);
            }

            self.log.trace(
                Event::AckRecorded,
                &[
                    ("replica", &replica.to_string()),
                    ("txn", &txn.to_string()),
                ],
            );

            if entry.acked.len() < entry.required {
                let outstanding = entry.required - entry.acked.len();
                return Ok(AckProgress::Recorded { outstanding });
            }
            pending.remove(&txn).map(|entry| entry.gate)
        };

        if let Some(gate) = released_gate {
            // Signal outside the pending lock: the gate's action may
            // be arbitrary caller code.
            gate.signal(DurabilitySubsystem::Replication)?;
            self.log.info(
                Event::ReplicationSignaled,
                &[("mode", "sync"), ("txn", &txn.to_string())],
            );
        }
        Ok(AckProgress::Released)
    }

    /// Transactions still awaiting replica acknowledgment.
    ///
    /// Outstanding entries for an unresponsive replica stay here
    /// forever: block-for-durability is deliberate, and timeout or
    /// fencing is a deployment-level policy.
    pub fn pending_transactions(&self) -> Vec<TransactionId> {
        let pending = self.pending.lock().unwrap();
        let mut txns: Vec<_> = pending.keys().copied().collect();
        txns.sort();
        txns
    }
}
