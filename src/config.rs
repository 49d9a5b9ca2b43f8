//! Replication Configuration
//!
//! Configured externally (file, env, CLI), immutable after startup.
//! Defaults are the safe path: asynchronous mode, all-replica
//! acknowledgment if synchronous mode is chosen.
//!
//! Per REPLICATION_LOG_FLOW.md §4.3 the synchronous acknowledgment
//! policy is configurable (all replicas or a quorum), not hard-coded.

use serde::{Deserialize, Serialize};

use crate::observability::LogConfig;
use crate::primary::{PrimaryError, PrimaryResult};

/// Delivery mode for commit acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationMode {
    /// Commit callbacks' replication contribution is signaled on
    /// transport handoff. Client commits never wait on replica
    /// state; data loss on primary failure is the accepted trade-off.
    Asynchronous,

    /// Commit callbacks' replication contribution waits for replica
    /// acknowledgment per the configured `AckPolicy`.
    Synchronous,
}

/// How many replica acknowledgments release a synchronous commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckPolicy {
    /// Every replica registered at dispatch time must acknowledge.
    All,
    /// A fixed number of distinct replicas must acknowledge.
    Quorum(usize),
}

impl AckPolicy {
    /// Acknowledgments required for a given replica count.
    pub fn required_acks(&self, replica_count: usize) -> usize {
        match self {
            AckPolicy::All => replica_count,
            AckPolicy::Quorum(n) => *n,
        }
    }
}

/// Batch formation thresholds.
///
/// Bounded and configuration-defined; the batching stage seals when
/// either limit is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum number of records in a batch.
    pub max_records: usize,
    /// Maximum total redo payload bytes in a batch.
    pub max_bytes: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_records: 16,
            max_bytes: 64 * 1024,
        }
    }
}

/// Replication engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Delivery mode.
    pub mode: ReplicationMode,

    /// Synchronous acknowledgment policy. Ignored in asynchronous
    /// mode.
    pub ack_policy: AckPolicy,

    /// Batch formation thresholds.
    pub batch: BatchConfig,

    /// Intended tick rate for the idle OAT notification
    /// (DEFERRED_APPLY.md §3.2). The engine does not own a timer;
    /// the embedding process drives `LogBatcher::idle_notification`
    /// at this interval.
    pub heartbeat_interval_ms: u64,

    /// Component logging.
    pub log: LogConfig,
}

impl ReplicationConfig {
    /// Asynchronous configuration with default thresholds.
    pub fn asynchronous() -> Self {
        Self {
            mode: ReplicationMode::Asynchronous,
            ack_policy: AckPolicy::All,
            batch: BatchConfig::default(),
            heartbeat_interval_ms: 100,
            log: LogConfig::default(),
        }
    }

    /// Synchronous configuration with the given acknowledgment
    /// policy.
    pub fn synchronous(ack_policy: AckPolicy) -> Self {
        Self {
            mode: ReplicationMode::Synchronous,
            ack_policy,
            ..Self::asynchronous()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> PrimaryResult<()> {
        if self.batch.max_records == 0 {
            return Err(PrimaryError::configuration_error(
                "batch.max_records must be at least 1",
            ));
        }
        if self.batch.max_bytes == 0 {
            return Err(PrimaryError::configuration_error(
                "batch.max_bytes must be at least 1",
            ));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(PrimaryError::configuration_error(
                "heartbeat_interval_ms must be at least 1",
            ));
        }
        if let AckPolicy::Quorum(n) = self.ack_policy {
            if n == 0 {
                return Err(PrimaryError::configuration_error(
                    "ack_policy quorum must be at least 1",
                ));
            }
        }
        Ok(())
    }

    /// Check if commits wait for replica acknowledgment.
    pub fn is_synchronous(&self) -> bool {
        self.mode == ReplicationMode::Synchronous
    }
}

impl Default for ReplicationConfig {
    /// Default is asynchronous: client commits never block on
    /// replica state.
    fn default() -> Self {
        Self::asynchronous()
    }
}
