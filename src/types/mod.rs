//! Type definitions for the scoring pipeline

pub mod scored;
pub mod transaction;

pub use scored::ScoredRecord;
pub use transaction::{CleanTransaction, DropReason, RawTransaction};

/// Wire format for event and processing times in both ledgers.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
