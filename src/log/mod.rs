//! Log Record and Batch Model
//!
//! Per REPLICATION_LOG_FLOW.md §2:
//! - Records are grouped into batches, the unit of network transfer
//! - Records of one transaction appear in production order
//! - Records of different transactions carry no ordering guarantee,
//!   even inside one batch
//! - Every redo payload is individually checksummed

mod batch;
mod errors;
mod record;

pub use batch::Batch;
pub use errors::{LogError, LogErrorKind, LogResult};
pub use record::{Record, RecordBody, RecordKind};
