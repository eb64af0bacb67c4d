//! Shared data models for the lifelog summary hierarchy.
//!
//! This crate provides Serde-serializable types for:
//! - Timestamped (or labeled) text records and their store keys
//! - Buckets of records grouped for summarization
//! - Summary levels and the configurable level chain
//! - Subject and run identifiers

pub mod bucket;
pub mod level;
pub mod record;
pub mod subject;
pub mod timestamp;

// Re-export common types
pub use bucket::Bucket;
pub use level::{Level, LevelChain, LevelError, LevelSpec};
pub use record::{Record, RecordKey};
pub use subject::{RunId, SubjectId};
pub use timestamp::{TimestampError, UNDATED};
