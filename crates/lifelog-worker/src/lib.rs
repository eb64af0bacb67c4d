//! Hierarchical summary aggregation.
//!
//! This crate provides:
//! - Data-anchored bucket partitioning and per-level aggregation
//! - The hierarchy driver: per-subject level chains, cross-subject fold and
//!   the terminal record
//! - Shared throttling of summarization calls
//! - Bucket retry with exponential backoff
//! - Structured stage logging and metrics
//! - JSONL training export of produced summaries

pub mod aggregator;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod logging;
pub mod metrics;
pub mod retry;
pub mod throttle;
pub mod training;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{partition, AggregationReport, BucketAggregator, BucketFailure, BucketOutcome};
pub use config::PipelineConfig;
pub use error::{WorkerError, WorkerResult};
pub use hierarchy::{
    FoldEntry, FoldOutcome, FoldReport, HierarchyDriver, HierarchyReport, LevelOutcome, SubjectReport,
    TerminalOutcome,
};
pub use logging::StageLogger;
pub use retry::{retry_async_if, RetryConfig, RetryResult};
pub use throttle::SynthesisThrottle;
pub use training::{TrainingExample, TrainingExporter};
