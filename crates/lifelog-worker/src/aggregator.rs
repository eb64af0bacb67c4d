//! Bucket aggregation for a single level.
//!
//! A level reads an ordered input store, partitions it into data-anchored
//! buckets, and writes one output record per bucket: single-member buckets
//! verbatim, larger ones through the summarization service.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::Duration;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use lifelog_ml_client::SummarizationService;
use lifelog_models::{Bucket, Level, LevelSpec, Record, RecordKey};
use lifelog_storage::{RecordStore, StorageError, StoreId};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics::{self, outcome};
use crate::retry::{retry_async_if, RetryConfig};
use crate::throttle::SynthesisThrottle;

/// Partition records into buckets of at most `width`.
///
/// Records are first stable-sorted by timestamp, so undated (label) records
/// come before every dated one and ties keep their listing order. A bucket opens at the first record not yet assigned and absorbs every
/// following record whose timestamp is before `start + width`. The first
/// record at or past that bound opens the next bucket. Every input record
/// lands in exactly one bucket.
pub fn partition(mut records: Vec<Record>, width: Duration) -> Vec<Bucket> {
    records.sort_by_key(Record::timestamp);

    let mut buckets = Vec::new();
    let mut current: Option<Bucket> = None;

    for record in records {
        match current.as_mut() {
            Some(bucket) if bucket.accepts(&record) => bucket.push(record),
            _ => {
                if let Some(done) = current.take() {
                    buckets.push(done);
                }
                current = Some(Bucket::open(record, width));
            }
        }
    }

    if let Some(done) = current {
        buckets.push(done);
    }
    buckets
}

/// How a bucket's output record came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketOutcome {
    /// Single member copied verbatim.
    Passthrough,
    /// Members synthesized by the summarization service.
    Summarized,
    /// Output already present and gap filling was enabled.
    Reused,
}

impl BucketOutcome {
    fn metric_label(self) -> &'static str {
        match self {
            BucketOutcome::Passthrough => outcome::PASSTHROUGH,
            BucketOutcome::Summarized => outcome::SUMMARIZED,
            BucketOutcome::Reused => outcome::REUSED,
        }
    }
}

/// A bucket whose output record could not be produced.
#[derive(Debug, Error)]
#[error(
    "bucket {} at level {level} ({} members) failed: {source}",
    .bucket.output_key(),
    .bucket.len()
)]
pub struct BucketFailure {
    pub level: Level,
    pub bucket: Bucket,
    pub source: WorkerError,
}

impl BucketFailure {
    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}

/// Outcome of one aggregation pass over a level.
#[derive(Debug)]
pub struct AggregationReport {
    pub level: Level,
    pub output: StoreId,
    /// Buckets derived from the input
    pub buckets: usize,
    /// Keys written or reused, in bucket order
    pub written: Vec<RecordKey>,
    pub passthrough: usize,
    pub summarized: usize,
    pub reused: usize,
    pub failures: Vec<BucketFailure>,
}

impl AggregationReport {
    fn new(level: Level, output: StoreId, buckets: usize) -> Self {
        Self {
            level,
            output,
            buckets,
            written: Vec::new(),
            passthrough: 0,
            summarized: 0,
            reused: 0,
            failures: Vec::new(),
        }
    }

    fn record(&mut self, key: RecordKey, outcome: BucketOutcome) {
        match outcome {
            BucketOutcome::Passthrough => self.passthrough += 1,
            BucketOutcome::Summarized => self.summarized += 1,
            BucketOutcome::Reused => self.reused += 1,
        }
        self.written.push(key);
    }

    /// Every bucket produced its output record.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn has_retryable_failures(&self) -> bool {
        self.failures.iter().any(BucketFailure::is_retryable)
    }

    /// Remove and return the buckets whose failure is worth retrying.
    pub fn take_retryable(&mut self) -> Vec<Bucket> {
        let (retryable, permanent): (Vec<_>, Vec<_>) = std::mem::take(&mut self.failures)
            .into_iter()
            .partition(BucketFailure::is_retryable);
        self.failures = permanent;
        retryable.into_iter().map(|f| f.bucket).collect()
    }

    /// Fold a retry pass over a subset of this level's buckets into this report.
    pub fn absorb(&mut self, retry: AggregationReport) {
        self.written.extend(retry.written);
        self.written.sort_by_key(|key| (key.timestamp(), key.as_name()));
        self.passthrough += retry.passthrough;
        self.summarized += retry.summarized;
        self.reused += retry.reused;
        self.failures.extend(retry.failures);
        self.failures.sort_by_key(|f| f.bucket.start);
    }
}

/// Produces one level's output store from its input store.
pub struct BucketAggregator<S, M> {
    store: Arc<S>,
    summarizer: Arc<M>,
    throttle: Arc<SynthesisThrottle>,
    fill_gaps: bool,
    write_retry: RetryConfig,
}

impl<S, M> BucketAggregator<S, M>
where
    S: RecordStore,
    M: SummarizationService,
{
    pub fn new(store: Arc<S>, summarizer: Arc<M>, throttle: Arc<SynthesisThrottle>) -> Self {
        Self {
            store,
            summarizer,
            throttle,
            fill_gaps: false,
            write_retry: RetryConfig::new("record_write")
                .with_max_retries(2)
                .with_base_delay(StdDuration::from_millis(50)),
        }
    }

    /// Skip buckets whose output record already exists.
    pub fn with_fill_gaps(mut self, fill_gaps: bool) -> Self {
        self.fill_gaps = fill_gaps;
        self
    }

    pub fn fill_gaps(&self) -> bool {
        self.fill_gaps
    }

    /// Aggregate `input` into `output` at `spec`'s level and width.
    ///
    /// Fails only when the input store cannot be listed; a missing input
    /// store surfaces as [`StorageError::NotFound`]. Per-bucket failures are
    /// collected in the report and never stop the remaining buckets.
    pub async fn run(
        &self,
        input: &StoreId,
        output: &StoreId,
        spec: &LevelSpec,
    ) -> WorkerResult<AggregationReport> {
        let records = self.store.list(input).await?;
        let buckets = partition(records, spec.width());

        debug!(
            level = %spec.level,
            input = %input,
            buckets = buckets.len(),
            "Partitioned input store"
        );

        Ok(self.resolve(buckets, spec.level, output).await)
    }

    /// Produce the output record of each bucket.
    ///
    /// Synthesis calls go through the shared throttle; output keys depend
    /// only on the buckets, never on completion order.
    pub async fn resolve(&self, buckets: Vec<Bucket>, level: Level, output: &StoreId) -> AggregationReport {
        let existing = if self.fill_gaps {
            self.existing_keys(output).await
        } else {
            HashSet::new()
        };

        let results = join_all(
            buckets
                .iter()
                .map(|bucket| self.resolve_one(bucket, level, output, &existing)),
        )
        .await;

        let mut report = AggregationReport::new(level, output.clone(), buckets.len());
        for (bucket, result) in buckets.into_iter().zip(results) {
            match result {
                Ok(outcome) => {
                    metrics::record_bucket(level, outcome.metric_label());
                    report.record(bucket.output_key(), outcome);
                }
                Err(source) => {
                    metrics::record_bucket(level, outcome::FAILED);
                    let failure = BucketFailure {
                        level,
                        bucket,
                        source,
                    };
                    warn!(output = %output, "{}", failure);
                    report.failures.push(failure);
                }
            }
        }

        info!(
            level = %level,
            output = %output,
            buckets = report.buckets,
            passthrough = report.passthrough,
            summarized = report.summarized,
            reused = report.reused,
            failed = report.failures.len(),
            "Level aggregated"
        );

        report
    }

    /// One throttled call to the summarization service.
    pub async fn synthesize(&self, members: &[Record], level: Level) -> WorkerResult<String> {
        let _permit = self.throttle.acquire().await?;
        let started = Instant::now();
        let result = self.summarizer.summarize(members, level).await;
        metrics::record_summarize_latency(level, started.elapsed().as_secs_f64());
        Ok(result?)
    }

    /// Write one record, retrying transient storage failures.
    pub async fn write(&self, output: &StoreId, key: &RecordKey, text: &str) -> WorkerResult<()> {
        retry_async_if(&self.write_retry, is_transient_write_error, || {
            self.store.put(output, key, text)
        })
        .await
        .into_result()
        .map_err(WorkerError::from)
    }

    async fn resolve_one(
        &self,
        bucket: &Bucket,
        level: Level,
        output: &StoreId,
        existing: &HashSet<String>,
    ) -> WorkerResult<BucketOutcome> {
        let key = bucket.output_key();

        if existing.contains(&key.as_name()) {
            return Ok(BucketOutcome::Reused);
        }

        if let Some(text) = bucket.passthrough_text() {
            self.write(output, &key, text).await?;
            return Ok(BucketOutcome::Passthrough);
        }

        let text = self.synthesize(&bucket.members, level).await?;
        self.write(output, &key, &text).await?;
        Ok(BucketOutcome::Summarized)
    }

    async fn existing_keys(&self, output: &StoreId) -> HashSet<String> {
        match self.store.list_or_empty(output).await {
            Ok(records) => records.into_iter().map(|r| r.key.as_name()).collect(),
            Err(e) => {
                warn!(output = %output, "Could not list existing outputs, filling all buckets: {}", e);
                HashSet::new()
            }
        }
    }
}

fn is_transient_write_error(error: &StorageError) -> bool {
    matches!(
        error,
        StorageError::Io(_) | StorageError::WriteFailed(_)
    )
}
