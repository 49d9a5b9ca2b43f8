//! Transport Seam
//!
//! The real network is an external collaborator. This module defines
//! what the engine consumes from it:
//! - `Messenger::send`: asynchronous handoff, ordered per connection,
//!   error on connection loss
//! - `MessagePoll::poll`: poll-based inbound delivery, so the
//!   receiving stage is driven without busy-waiting
//!
//! Delivery is assumed reliable, FIFO per connection, and
//! at-least-once; every wire message is idempotent-safe to receive
//! more than once (REPLICATION_LOG_FLOW.md §3.3, §5.2).
//!
//! `memory_pair` provides the in-process implementation used by
//! tests and single-process deployments.

mod errors;
mod memory;
mod messages;

pub use errors::{TransportError, TransportResult};
pub use memory::{memory_pair, MemoryConnection};
pub use messages::ReplicationMessage;

/// Outbound half of a connection.
pub trait Messenger: Send {
    /// Hand a message to the transport for ordered delivery.
    fn send(&self, message: ReplicationMessage) -> TransportResult<()>;
}

/// Inbound half of a connection.
pub trait MessagePoll: Send {
    /// Take the next delivered message, if one is waiting.
    ///
    /// `Ok(None)` means nothing is queued; an error means the peer
    /// is gone.
    fn poll(&self) -> TransportResult<Option<ReplicationMessage>>;
}
