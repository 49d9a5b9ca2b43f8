//! shiplog: strict, ordered log replication with OAT-based deferred
//! apply.
//!
//! A primary serializes transaction log records into sequence-numbered
//! batches and streams them to replicas. Replicas never apply a record
//! on arrival: records are buffered per transaction, and a transaction
//! is applied only once the Oldest-Active-Transaction (OAT) watermark
//! proves its serialization is complete (DEFERRED_APPLY.md §1).
//!
//! Commit durability is coordinated through per-transaction commit
//! gates: a commit callback fires only after every required durability
//! subsystem (WAL fsync, replication acknowledgment under the
//! configured policy) has signaled (REPLICATION_LOG_FLOW.md §5).
//!
//! Module map:
//! - [`txn`]: transaction identity, the active-transaction table, and
//!   the OAT watermark
//! - [`log`]: records, batches, and integrity checking
//! - [`commit`]: per-transaction commit gates and their registry
//! - [`primary`]: batching, dispatch, and acknowledgment tracking
//! - [`replica`]: batch sequencing and the deferred-apply engine
//! - [`transport`]: the network seam and the in-memory transport
//! - [`config`]: replication mode, acknowledgment policy, batching
//!   thresholds
//! - [`observability`]: structured event logging

pub mod commit;
pub mod config;
pub mod log;
pub mod observability;
pub mod primary;
pub mod replica;
pub mod transport;
pub mod txn;

pub use commit::{CommitGate, CommitGateRegistry, DurabilitySubsystem};
pub use config::{AckPolicy, BatchConfig, ReplicationConfig, ReplicationMode};
pub use log::{Batch, Record};
pub use primary::{LogBatcher, ReplicationManager};
pub use replica::{ApplyEngine, ReplicationLogProvider, StorageApply};
pub use txn::{ActiveTransactionTable, OatWatermark, TransactionId};
