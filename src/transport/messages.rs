//! Wire messages
//!
//! All three messages are one-way and fire-and-forget. Field
//! encoding is left to the transport's codec: the types carry serde
//! derives and nothing else.

use serde::{Deserialize, Serialize};

use crate::log::Batch;
use crate::txn::TransactionId;

/// Messages exchanged between primary and replicas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationMessage {
    /// Primary → Replica: a sealed batch of records.
    RecordsBatch(Batch),

    /// Primary → Replica: standalone OAT advance on an idle stream
    /// (DEFERRED_APPLY.md §3.2).
    NotifyOat(TransactionId),

    /// Replica → Primary: every record of the transaction has been
    /// applied to storage (REPLICATION_LOG_FLOW.md §5.1).
    TxnApplied(TransactionId),
}

impl ReplicationMessage {
    /// Message kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ReplicationMessage::RecordsBatch(_) => "RECORDS_BATCH",
            ReplicationMessage::NotifyOat(_) => "NOTIFY_OAT",
            ReplicationMessage::TxnApplied(_) => "TXN_APPLIED",
        }
    }
}
