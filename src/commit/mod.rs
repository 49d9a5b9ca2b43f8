//! Commit-Callback Gate
//!
//! Ties client-visible commit acknowledgment to durability signals.
//! Every serializing subsystem (WAL fsync, replication) signals the
//! gate exactly once; the wrapped action fires exactly once, when the
//! last required subsystem has signaled.
//!
//! Per REPLICATION_LOG_FLOW.md §4.2-4.3, which subsystems are
//! required depends on the replication mode, but the gate itself is
//! mode-agnostic: it only knows its required signal set.

mod errors;
mod gate;

pub use errors::{CommitError, CommitErrorKind, CommitResult};
pub use gate::{
    CommitAction, CommitGate, CommitGateRegistry, DurabilitySubsystem, GateProgress,
};
