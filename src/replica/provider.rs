//! Replication log provider
//!
//! Sequencing stage between the transport and the apply engine.
//!
//! Per REPLICATION_LOG_FLOW.md §3:
//! - §3.2 a batch above the expected sequence is buffered, not an
//!   error; nothing past the gap is handed to recovery
//! - §3.3 a batch below the expected sequence is a duplicate and is
//!   dropped
//!
//! "A batch was received" and "a batch is ready for recovery" are
//! deliberately decoupled: the transport may deliver batches from
//! independent network paths with different latencies, so arrival
//! order is not hand-off order.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Condvar, Mutex};

use crate::log::Batch;
use crate::observability::{Event, Logger};

use super::errors::{ReplicaError, ReplicaResult};

/// Outcome of receiving a batch from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The batch (and possibly buffered successors) became ready.
    Ready { available: usize },

    /// The batch arrived above the expected sequence and is held
    /// until the gap fills.
    Buffered { expected: u64, received: u64 },

    /// Already seen; dropped.
    Duplicate,

    /// Provider is shut down; the batch was discarded.
    ShutDown,
}

impl ReceiveOutcome {
    /// Check if the batch became ready for the apply engine.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Sequencing buffer with a blocking hand-off interface.
///
/// The transport-polling thread calls `on_batch_received`; the
/// recovery thread blocks in `wait_for_event`. One provider per
/// replica connection.
#[derive(Debug)]
pub struct ReplicationLogProvider {
    inner: Mutex<ProviderInner>,
    ready_signal: Condvar,
    log: Logger,
}

#[derive(Debug)]
struct ProviderInner {
    /// Sequence the stream is waiting for.
    next_expected: u64,
    /// Early arrivals, keyed by sequence.
    out_of_order: BTreeMap<u64, Batch>,
    /// Contiguous batches awaiting hand-off, in sequence order.
    ready: VecDeque<Batch>,
    shut_down: bool,
}

impl ReplicationLogProvider {
    /// Create a provider expecting sequence 0 first.
    pub fn new(log: Logger) -> Self {
        Self::starting_at(0, log)
    }

    /// Create a provider expecting a given first sequence, e.g.
    /// after a snapshot install.
    pub fn starting_at(first_sequence: u64, log: Logger) -> Self {
        Self {
            inner: Mutex::new(ProviderInner {
                next_expected: first_sequence,
                out_of_order: BTreeMap::new(),
                ready: VecDeque::new(),
                shut_down: false,
            }),
            ready_signal: Condvar::new(),
            log,
        }
    }

    /// Accept a batch in whatever order the transport delivered it.
    pub fn on_batch_received(&self, batch: Batch) -> ReceiveOutcome {
        let mut inner = self.inner.lock().unwrap();
        if inner.shut_down {
            return ReceiveOutcome::ShutDown;
        }

        let received = batch.sequence;
        let expected = inner.next_expected;

        if received < expected || inner.out_of_order.contains_key(&received) {
            self.log.trace(
                Event::BatchDuplicate,
                &[("sequence", &received.to_string())],
            );
            return ReceiveOutcome::Duplicate;
        }

        if received > expected {
            self.log.warn(
                Event::BatchBuffered,
                &[
                    ("expected", &expected.to_string()),
                    ("received", &received.to_string()),
                ],
            );
            inner.out_of_order.insert(received, batch);
            return ReceiveOutcome::Buffered { expected, received };
        }

        // Expected sequence: admit it and every buffered successor
        // that is now contiguous.
        inner.ready.push_back(batch);
        inner.next_expected += 1;
        loop {
            let seq = inner.next_expected;
            match inner.out_of_order.remove(&seq) {
                Some(next) => {
                    inner.ready.push_back(next);
                    inner.next_expected += 1;
                }
                None => break,
            }
        }

        let available = inner.ready.len();
        self.log.trace(
            Event::BatchReady,
            &[
                ("available", &available.to_string()),
                ("sequence", &received.to_string()),
            ],
        );
        self.ready_signal.notify_all();
        ReceiveOutcome::Ready { available }
    }

    /// Block until the next contiguous batch is ready.
    ///
    /// Batches come out in exact sequence order. Returns a shut-down
    /// error once `shutdown` has been called and the ready queue is
    /// drained.
    pub fn wait_for_event(&self) -> ReplicaResult<Batch> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(batch) = inner.ready.pop_front() {
                return Ok(batch);
            }
            if inner.shut_down {
                return Err(ReplicaError::shut_down());
            }
            inner = self.ready_signal.wait(inner).unwrap();
        }
    }

    /// Take the next ready batch without blocking.
    pub fn try_next(&self) -> Option<Batch> {
        self.inner.lock().unwrap().ready.pop_front()
    }

    /// Release every blocked waiter and refuse further batches.
    ///
    /// Already-ready batches are still handed out so an orderly
    /// shutdown does not drop contiguous work.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.shut_down = true;
        inner.out_of_order.clear();
        self.log.info(Event::ProviderShutdown, &[]);
        self.ready_signal.notify_all();
    }

    /// Sequence the stream is waiting for.
    pub fn next_expected(&self) -> u64 {
        self.inner.lock().unwrap().next_expected
    }

    /// Early arrivals currently held across a gap.
    pub fn buffered(&self) -> usize {
        self.inner.lock().unwrap().out_of_order.len()
    }
}
