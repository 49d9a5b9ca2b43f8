//! Primary-Side Replication
//!
//! Per REPLICATION_LOG_FLOW.md §1:
//! - The primary is the sole producer of records and sequence numbers
//!
//! Two stages:
//! - `LogBatcher` accumulates records, stamps commit records with the
//!   freshest OAT value at seal time, and produces the idle OAT
//!   notification on quiet streams
//! - `ReplicationManager` dispatches sealed batches to every replica
//!   in order and runs the mode-dependent commit acknowledgment
//!   bookkeeping

mod batcher;
mod errors;
mod manager;

pub use batcher::{LogBatcher, SealedBatch};
pub use errors::{PrimaryError, PrimaryErrorKind, PrimaryResult};
pub use manager::{AckProgress, ReplicaId, ReplicationManager};
