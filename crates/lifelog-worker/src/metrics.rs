//! Aggregation metrics.
//!
//! Recorded through the `metrics` facade. No exporter is installed by this
//! crate; hosts install one if they want the numbers.

use metrics::{counter, histogram};

use lifelog_models::Level;

/// Metric name constants for consistency.
pub mod names {
    /// Buckets resolved, by level and outcome.
    pub const BUCKETS_TOTAL: &str = "lifelog_buckets_total";

    /// Synthesis call latency in seconds, by level.
    pub const SUMMARIZE_LATENCY_SECONDS: &str = "lifelog_summarize_latency_seconds";

    /// Bucket retry passes, by level.
    pub const RETRIES_TOTAL: &str = "lifelog_retries_total";

    /// Levels skipped because their input store was missing.
    pub const SKIPPED_LEVELS_TOTAL: &str = "lifelog_skipped_levels_total";
}

/// Bucket outcome labels.
pub mod outcome {
    pub const PASSTHROUGH: &str = "passthrough";
    pub const SUMMARIZED: &str = "summarized";
    pub const REUSED: &str = "reused";
    pub const FAILED: &str = "failed";
}

/// Record one resolved bucket.
pub fn record_bucket(level: Level, outcome: &'static str) {
    counter!(
        names::BUCKETS_TOTAL,
        "level" => level.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record the latency of one synthesis call.
pub fn record_summarize_latency(level: Level, latency_secs: f64) {
    histogram!(
        names::SUMMARIZE_LATENCY_SECONDS,
        "level" => level.as_str()
    )
    .record(latency_secs);
}

/// Record a retry pass over failed buckets.
pub fn record_retry(level: Level) {
    counter!(
        names::RETRIES_TOTAL,
        "level" => level.as_str()
    )
    .increment(1);
}

pub fn record_skipped_level(level: Level) {
    counter!(
        names::SKIPPED_LEVELS_TOTAL,
        "level" => level.as_str()
    )
    .increment(1);
}
