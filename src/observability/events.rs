//! Observable replication events
//!
//! Events are explicit and typed. One log line = one event.

use std::fmt;

/// Observable events in the replication engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Primary: batching
    /// Batch sealed and handed to dispatch
    BatchSealed,
    /// Standalone OAT notification produced on an idle stream
    OatNotified,

    // Primary: dispatch and acknowledgment
    /// Batch handed to a replica's transport
    BatchDispatched,
    /// Replica acknowledged a transaction
    AckRecorded,
    /// Commit gate's replication contribution signaled
    ReplicationSignaled,

    // Replica: sequencing
    /// Batch arrived at the expected sequence
    BatchReady,
    /// Batch arrived above the expected sequence and was buffered
    BatchBuffered,
    /// Batch arrived below the expected sequence and was dropped
    BatchDuplicate,
    /// Provider shut down, blocked waiters released
    ProviderShutdown,

    // Replica: deferred apply
    /// OAT watermark advanced
    OatAdvanced,
    /// Transaction fully applied to storage
    TxnApplied,
    /// Aborted transaction's buffer discarded
    TxnAborted,
    /// Storage rejected a record (fatal to the connection)
    ApplyFailed,
}

impl Event {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BatchSealed => "BATCH_SEALED",
            Event::OatNotified => "OAT_NOTIFIED",
            Event::BatchDispatched => "BATCH_DISPATCHED",
            Event::AckRecorded => "ACK_RECORDED",
            Event::ReplicationSignaled => "REPLICATION_SIGNALED",
            Event::BatchReady => "BATCH_READY",
            Event::BatchBuffered => "BATCH_BUFFERED",
            Event::BatchDuplicate => "BATCH_DUPLICATE",
            Event::ProviderShutdown => "PROVIDER_SHUTDOWN",
            Event::OatAdvanced => "OAT_ADVANCED",
            Event::TxnApplied => "TXN_APPLIED",
            Event::TxnAborted => "TXN_ABORTED",
            Event::ApplyFailed => "APPLY_FAILED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
