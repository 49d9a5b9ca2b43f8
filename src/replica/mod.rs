//! Replica-Side Replication
//!
//! Two stages per replica connection:
//! - `ReplicationLogProvider` faces the transport: it sequences
//!   arriving batches, buffers across gaps, and hands out contiguous
//!   batches through a blocking interface
//!   (REPLICATION_LOG_FLOW.md §3)
//! - `ApplyEngine` consumes ready batches: it defers every record by
//!   transaction and applies a transaction only once the OAT
//!   watermark proves no interleaving hazard remains
//!   (DEFERRED_APPLY.md §2)
//!
//! Each connection owns its own provider, watermark, and deferred
//! buffers; no state is shared across replica connections.

mod apply;
mod errors;
mod provider;

pub use apply::{
    AckSink, ApplyEngine, ApplyStats, MessengerAckSink, StorageApply, SweepReport,
    TxnApplyState,
};
pub use errors::{ReplicaError, ReplicaErrorKind, ReplicaResult};
pub use provider::{ReceiveOutcome, ReplicationLogProvider};
