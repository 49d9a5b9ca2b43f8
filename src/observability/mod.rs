//! Observability for the replication engine
//!
//! - Structured logs (JSON), one line per event
//! - Deterministic key ordering
//! - Synchronous, no buffering, no background threads
//!
//! There is no process-wide verbosity flag: components receive a
//! `Logger` value at construction, built from `LogConfig`.

mod events;
mod logger;

pub use events::Event;
pub use logger::{LogConfig, Logger, Severity};
