//! Hierarchy driver.
//!
//! Runs the level chain for every subject, folds each subject's top level
//! into one labeled record per subject, and reduces the folded records to a
//! single terminal record.
//!
//! ```text
//! <subject>/raw_summaries -> minute -> ten_minute -> hour -> day   (per subject)
//! day_summaries/<subject>                                          (fold)
//! week_summaries/<label>                                           (terminal)
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::Instrument;

use lifelog_ml_client::SummarizationService;
use lifelog_models::{Bucket, Level, LevelSpec, Record, RecordKey, RunId, SubjectId};
use lifelog_storage::{RecordStore, StoreId, StoreLayout};

use crate::aggregator::{AggregationReport, BucketAggregator, BucketFailure, BucketOutcome};
use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::StageLogger;
use crate::metrics;
use crate::retry::retry_async_if;
use crate::throttle::SynthesisThrottle;

/// What happened to one level of one subject.
#[derive(Debug)]
pub enum LevelOutcome {
    /// Every bucket produced its output record.
    Completed(AggregationReport),
    /// Some buckets still failed after the retry passes.
    Incomplete(AggregationReport),
    /// The input store does not exist yet.
    Skipped { level: Level, input: StoreId },
    /// Not attempted because an earlier level of the subject is incomplete.
    Blocked { level: Level },
    /// The input store could not be read.
    Failed { level: Level, error: WorkerError },
}

impl LevelOutcome {
    pub fn level(&self) -> Level {
        match self {
            LevelOutcome::Completed(report) | LevelOutcome::Incomplete(report) => report.level,
            LevelOutcome::Skipped { level, .. }
            | LevelOutcome::Blocked { level }
            | LevelOutcome::Failed { level, .. } => *level,
        }
    }

    pub fn report(&self) -> Option<&AggregationReport> {
        match self {
            LevelOutcome::Completed(report) | LevelOutcome::Incomplete(report) => Some(report),
            _ => None,
        }
    }

    /// Successor levels must not run on top of this outcome.
    fn blocks_successors(&self) -> bool {
        matches!(
            self,
            LevelOutcome::Incomplete(_) | LevelOutcome::Blocked { .. } | LevelOutcome::Failed { .. }
        )
    }
}

#[derive(Debug)]
pub struct SubjectReport {
    pub subject: SubjectId,
    pub levels: Vec<LevelOutcome>,
}

impl SubjectReport {
    /// No level failed or was blocked. Skipped levels count as complete.
    pub fn is_complete(&self) -> bool {
        !self.levels.iter().any(LevelOutcome::blocks_successors)
    }

    pub fn outcome(&self, level: Level) -> Option<&LevelOutcome> {
        self.levels.iter().find(|outcome| outcome.level() == level)
    }

    pub fn failures(&self) -> impl Iterator<Item = &BucketFailure> {
        self.levels
            .iter()
            .filter_map(LevelOutcome::report)
            .flat_map(|report| report.failures.iter())
    }
}

/// What happened to one subject during the fold.
#[derive(Debug)]
pub enum FoldOutcome {
    /// The subject's single top-level record was copied under its label.
    Copied,
    /// Several top-level records were synthesized into one.
    Summarized,
    /// The labeled record already existed and gap filling was enabled.
    Reused,
    /// The subject produced no top-level records.
    Empty,
    /// The subject's chain did not complete this run.
    Excluded,
    Failed(WorkerError),
}

#[derive(Debug)]
pub struct FoldEntry {
    pub subject: SubjectId,
    pub outcome: FoldOutcome,
}

#[derive(Debug)]
pub struct FoldReport {
    pub level: Level,
    pub store: StoreId,
    pub entries: Vec<FoldEntry>,
}

impl FoldReport {
    /// Every included subject was folded.
    pub fn is_complete(&self) -> bool {
        !self
            .entries
            .iter()
            .any(|entry| matches!(entry.outcome, FoldOutcome::Excluded | FoldOutcome::Failed(_)))
    }

    /// Labeled records written this run.
    pub fn written(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, FoldOutcome::Copied | FoldOutcome::Summarized))
            .count()
    }
}

#[derive(Debug)]
pub enum TerminalOutcome {
    Written { key: RecordKey, outcome: BucketOutcome },
    /// No folded records exist.
    Empty,
    /// The fold is incomplete, so the terminal record would be partial.
    Blocked,
    Failed(WorkerError),
}

/// Outcome of one driver run.
#[derive(Debug)]
pub struct HierarchyReport {
    pub run_id: RunId,
    pub subjects: Vec<SubjectReport>,
    pub fold: FoldReport,
    pub terminal: TerminalOutcome,
}

impl HierarchyReport {
    pub fn is_complete(&self) -> bool {
        self.subjects.iter().all(SubjectReport::is_complete)
            && self.fold.is_complete()
            && matches!(
                self.terminal,
                TerminalOutcome::Written { .. } | TerminalOutcome::Empty
            )
    }

    pub fn subject(&self, subject: &SubjectId) -> Option<&SubjectReport> {
        self.subjects.iter().find(|report| &report.subject == subject)
    }

    /// Every bucket that still failed, across all subjects.
    pub fn failures(&self) -> impl Iterator<Item = &BucketFailure> {
        self.subjects.iter().flat_map(SubjectReport::failures)
    }

    /// Buckets the summarization service refused; these need operator attention.
    pub fn rejected(&self) -> impl Iterator<Item = &BucketFailure> {
        self.failures().filter(|failure| failure.source.is_rejected())
    }
}

pub struct HierarchyDriver<S, M> {
    config: PipelineConfig,
    layout: StoreLayout,
    store: Arc<S>,
    aggregator: BucketAggregator<S, M>,
}

impl<S, M> HierarchyDriver<S, M>
where
    S: RecordStore,
    M: SummarizationService,
{
    pub fn new(config: PipelineConfig, store: Arc<S>, summarizer: Arc<M>) -> WorkerResult<Self> {
        config.validate()?;

        let throttle = Arc::new(SynthesisThrottle::new(
            config.max_parallel_summaries,
            config.summary_cooldown,
        ));
        let aggregator = BucketAggregator::new(store.clone(), summarizer, throttle)
            .with_fill_gaps(config.fill_gaps);

        Ok(Self {
            layout: config.layout(),
            config,
            store,
            aggregator,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole hierarchy under a fresh run id.
    pub async fn run(&self) -> WorkerResult<HierarchyReport> {
        self.run_with_id(RunId::new()).await
    }

    pub async fn run_with_id(&self, run_id: RunId) -> WorkerResult<HierarchyReport> {
        let span = tracing::info_span!("run", run_id = %run_id);
        async {
            tracing::info!(
                subjects = self.config.subjects.len(),
                levels = self.config.chain.levels.len(),
                "Hierarchy run started"
            );

            let subjects = self.run_subjects(&run_id).await;
            let fold = self.fold(&run_id, &subjects).await?;
            let terminal = self.run_terminal(&run_id, &fold).await?;

            let report = HierarchyReport {
                run_id: run_id.clone(),
                subjects,
                fold,
                terminal,
            };

            tracing::info!(
                complete = report.is_complete(),
                failed_buckets = report.failures().count(),
                "Hierarchy run finished"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Run every subject's chain; subjects are independent of each other.
    async fn run_subjects(&self, run_id: &RunId) -> Vec<SubjectReport> {
        let permits = Semaphore::new(self.config.max_parallel_subjects.max(1));

        join_all(self.config.subjects.iter().map(|subject| {
            let permits = &permits;
            async move {
                let _permit = permits.acquire().await.ok();
                self.run_subject(run_id, subject).await
            }
        }))
        .await
    }

    /// Run the level chain of one subject, level by level.
    pub async fn run_subject(&self, run_id: &RunId, subject: &SubjectId) -> SubjectReport {
        let mut levels = Vec::with_capacity(self.config.chain.levels.len());
        let mut blocked = false;

        for spec in &self.config.chain.levels {
            if blocked {
                levels.push(LevelOutcome::Blocked { level: spec.level });
                continue;
            }

            let logger = StageLogger::new(run_id, subject, spec.level);
            let outcome = self
                .run_level(subject, spec, &logger)
                .instrument(logger.create_span())
                .await;
            blocked = outcome.blocks_successors();
            levels.push(outcome);
        }

        SubjectReport {
            subject: subject.clone(),
            levels,
        }
    }

    async fn run_level(&self, subject: &SubjectId, spec: &LevelSpec, logger: &StageLogger) -> LevelOutcome {
        let level = spec.level;
        let predecessor = self.config.chain.predecessor(level);

        let stores = self
            .layout
            .input(subject, predecessor)
            .and_then(|input| Ok((input, self.layout.level(subject, level)?)));
        let (input, output) = match stores {
            Ok(stores) => stores,
            Err(e) => {
                logger.log_error(&e.to_string());
                return LevelOutcome::Failed {
                    level,
                    error: e.into(),
                };
            }
        };

        logger.log_start(&format!("{} -> {}", input, output));

        match self.aggregator.run(&input, &output, spec).await {
            Ok(report) => {
                let report = self.retry_failed(report, logger).await;
                if report.is_complete() {
                    logger.log_completion(&format!(
                        "{} buckets ({} summarized, {} passthrough, {} reused)",
                        report.buckets, report.summarized, report.passthrough, report.reused
                    ));
                    LevelOutcome::Completed(report)
                } else {
                    logger.log_error(&format!(
                        "{} of {} buckets failed, later levels blocked",
                        report.failures.len(),
                        report.buckets
                    ));
                    LevelOutcome::Incomplete(report)
                }
            }
            Err(e) if e.is_store_not_found() => {
                metrics::record_skipped_level(level);
                logger.log_skip(&format!("input store {} does not exist", input));
                LevelOutcome::Skipped { level, input }
            }
            Err(error) => {
                logger.log_error(&format!("could not read {}: {}", input, error));
                LevelOutcome::Failed { level, error }
            }
        }
    }

    /// Re-resolve buckets that failed with a transient error.
    async fn retry_failed(&self, mut report: AggregationReport, logger: &StageLogger) -> AggregationReport {
        let retry = &self.config.bucket_retry;
        let mut attempt = 0;

        while attempt < retry.max_retries && report.has_retryable_failures() {
            let buckets = report.take_retryable();
            let delay = retry.delay_for_attempt(attempt);
            attempt += 1;

            logger.log_warning(&format!(
                "retrying {} buckets (pass {}/{}) in {:?}",
                buckets.len(),
                attempt,
                retry.max_retries,
                delay
            ));
            metrics::record_retry(report.level);
            tokio::time::sleep(delay).await;

            let output = report.output.clone();
            let retried = self.aggregator.resolve(buckets, report.level, &output).await;
            report.absorb(retried);
        }

        report
    }

    /// Fold each complete subject's top level into one labeled record.
    async fn fold(&self, run_id: &RunId, subjects: &[SubjectReport]) -> WorkerResult<FoldReport> {
        let spec = self
            .config
            .chain
            .fold_level()
            .ok_or(lifelog_models::LevelError::EmptyChain)?;
        let store = self.layout.folded(spec.level)?;
        let logger = StageLogger::cross_subject(run_id, "fold");
        logger.log_start(&format!("{} subjects into {}", subjects.len(), store));

        let existing: HashSet<String> = if self.config.fill_gaps {
            self.store
                .list_or_empty(&store)
                .await?
                .into_iter()
                .map(|record| record.key.as_name())
                .collect()
        } else {
            HashSet::new()
        };

        let outcomes = join_all(
            subjects
                .iter()
                .map(|report| self.fold_subject(report, spec, &store, &existing)),
        )
        .await;

        let entries: Vec<FoldEntry> = subjects
            .iter()
            .zip(outcomes)
            .map(|(report, outcome)| {
                match &outcome {
                    FoldOutcome::Excluded => logger.log_warning(&format!(
                        "{} excluded, its chain did not complete",
                        report.subject
                    )),
                    FoldOutcome::Failed(e) => {
                        logger.log_error(&format!("{} could not be folded: {}", report.subject, e))
                    }
                    _ => {}
                }
                FoldEntry {
                    subject: report.subject.clone(),
                    outcome,
                }
            })
            .collect();

        let report = FoldReport {
            level: spec.level,
            store,
            entries,
        };
        logger.log_completion(&format!("{} labeled records written", report.written()));
        Ok(report)
    }

    async fn fold_subject(
        &self,
        report: &SubjectReport,
        spec: &LevelSpec,
        folded: &StoreId,
        existing: &HashSet<String>,
    ) -> FoldOutcome {
        if !report.is_complete() {
            return FoldOutcome::Excluded;
        }

        let key = RecordKey::label(report.subject.as_str());
        if existing.contains(&key.as_name()) {
            return FoldOutcome::Reused;
        }

        match self.fold_records(&report.subject, spec, folded, &key).await {
            Ok(outcome) => outcome,
            Err(e) => FoldOutcome::Failed(e),
        }
    }

    async fn fold_records(
        &self,
        subject: &SubjectId,
        spec: &LevelSpec,
        folded: &StoreId,
        key: &RecordKey,
    ) -> WorkerResult<FoldOutcome> {
        let source = self.layout.level(subject, spec.level)?;
        let mut records = self.store.list_or_empty(&source).await?;
        records.sort_by_key(Record::timestamp);

        match records.as_slice() {
            [] => Ok(FoldOutcome::Empty),
            [only] => {
                self.aggregator.write(folded, key, &only.text).await?;
                Ok(FoldOutcome::Copied)
            }
            many => {
                let text = self.synthesize_with_retry(many, spec.level).await?;
                self.aggregator.write(folded, key, &text).await?;
                Ok(FoldOutcome::Summarized)
            }
        }
    }

    /// Reduce all folded records to the terminal record.
    async fn run_terminal(&self, run_id: &RunId, fold: &FoldReport) -> WorkerResult<TerminalOutcome> {
        let terminal = &self.config.chain.terminal;
        let logger = StageLogger::cross_subject(run_id, "terminal");

        if !fold.is_complete() {
            logger.log_warning("fold incomplete, terminal record not produced");
            return Ok(TerminalOutcome::Blocked);
        }

        let records = self.ordered_folded_records(&fold.store).await?;
        if records.is_empty() {
            logger.log_skip(&format!("{} is empty", fold.store));
            return Ok(TerminalOutcome::Empty);
        }

        let output = self.layout.terminal(terminal.level)?;
        let key = RecordKey::label(self.config.terminal_label.as_str());

        if self.config.fill_gaps && fold.written() == 0 {
            let existing = self.store.list_or_empty(&output).await?;
            if existing.iter().any(|record| record.key == key) {
                logger.log_skip(&format!("{} already exists", key));
                return Ok(TerminalOutcome::Written {
                    key,
                    outcome: BucketOutcome::Reused,
                });
            }
        }

        logger.log_start(&format!("{} folded records into {}", records.len(), output));

        // One bucket over every folded record, regardless of width.
        let mut members = records.into_iter();
        let bucket = match members.next() {
            Some(first) => members.fold(Bucket::open(first, terminal.width()), |mut bucket, record| {
                bucket.push(record);
                bucket
            }),
            None => return Ok(TerminalOutcome::Empty),
        };

        let result = match bucket.passthrough_text() {
            Some(text) => self
                .aggregator
                .write(&output, &key, text)
                .await
                .map(|_| BucketOutcome::Passthrough),
            None => match self.synthesize_with_retry(&bucket.members, terminal.level).await {
                Ok(text) => self
                    .aggregator
                    .write(&output, &key, &text)
                    .await
                    .map(|_| BucketOutcome::Summarized),
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(outcome) => {
                logger.log_completion(&format!("{} written ({:?})", key, outcome));
                Ok(TerminalOutcome::Written { key, outcome })
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                Ok(TerminalOutcome::Failed(e))
            }
        }
    }

    /// Folded records in configured subject order; labels of subjects not in
    /// this run's list follow in key order.
    async fn ordered_folded_records(&self, store: &StoreId) -> WorkerResult<Vec<Record>> {
        let mut records = self.store.list_or_empty(store).await?;
        let rank = |record: &Record| {
            self.config
                .subjects
                .iter()
                .position(|subject| record.key == RecordKey::label(subject.as_str()))
                .unwrap_or(usize::MAX)
        };
        records.sort_by_key(|record| (rank(record), record.key.as_name()));
        Ok(records)
    }

    async fn synthesize_with_retry(&self, members: &[Record], level: Level) -> WorkerResult<String> {
        let config = self
            .config
            .bucket_retry
            .clone();
        retry_async_if(&config, WorkerError::is_retryable, || {
            self.aggregator.synthesize(members, level)
        })
        .await
        .into_result()
    }
}
