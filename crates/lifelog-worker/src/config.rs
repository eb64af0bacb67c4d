//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use lifelog_ml_client::DEFAULT_PERSONA;
use lifelog_models::{Level, LevelChain, SubjectId};
use lifelog_storage::{StoreLayout, DEFAULT_LEAF_STORE};

use crate::error::{WorkerError, WorkerResult};
use crate::retry::RetryConfig;

/// Default label of the terminal record.
pub const DEFAULT_TERMINAL_LABEL: &str = "week";

/// Aggregation pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the filesystem record store
    pub root_dir: PathBuf,
    /// Subjects (e.g. days of the week) to aggregate, in fold order
    pub subjects: Vec<SubjectId>,
    /// Who the captions describe; substituted into every prompt
    pub persona: String,
    /// Per-subject levels plus the terminal level
    pub chain: LevelChain,
    /// Folder name of the leaf caption store inside each subject
    pub leaf_store: String,
    /// Key of the terminal record
    pub terminal_label: String,
    /// Maximum synthesis calls in flight across all subjects
    pub max_parallel_summaries: usize,
    /// Maximum subjects whose chains run at the same time
    pub max_parallel_subjects: usize,
    /// Minimum spacing between synthesis calls (zero disables)
    pub summary_cooldown: Duration,
    /// Skip buckets whose output record already exists
    pub fill_gaps: bool,
    /// Retry passes over buckets that failed with a transient error
    pub bucket_retry: RetryConfig,
    /// Write a JSONL training export here after the run
    pub training_output: Option<PathBuf>,
    /// Levels included in the training export
    pub training_levels: Vec<Level>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./lifelog"),
            subjects: Vec::new(),
            persona: DEFAULT_PERSONA.to_string(),
            chain: LevelChain::default(),
            leaf_store: DEFAULT_LEAF_STORE.to_string(),
            terminal_label: DEFAULT_TERMINAL_LABEL.to_string(),
            max_parallel_summaries: 1,
            max_parallel_subjects: 1,
            summary_cooldown: Duration::ZERO,
            fill_gaps: false,
            bucket_retry: RetryConfig::new("bucket_retry")
                .with_max_retries(2)
                .with_base_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(30)),
            training_output: None,
            training_levels: vec![Level::TenMinute, Level::Hour, Level::Day],
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let chain = match std::env::var("LIFELOG_LEVELS") {
            Ok(list) => select_levels(&defaults.chain, &list),
            Err(_) => defaults.chain.clone(),
        };

        Self {
            root_dir: std::env::var("LIFELOG_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.root_dir),
            subjects: std::env::var("LIFELOG_SUBJECTS")
                .map(|s| SubjectId::parse_list(&s))
                .unwrap_or_default(),
            persona: std::env::var("LIFELOG_PERSONA").unwrap_or(defaults.persona),
            chain,
            leaf_store: std::env::var("LIFELOG_LEAF_STORE").unwrap_or(defaults.leaf_store),
            terminal_label: std::env::var("LIFELOG_WEEK_LABEL").unwrap_or(defaults.terminal_label),
            max_parallel_summaries: std::env::var("LIFELOG_MAX_PARALLEL_SUMMARIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_parallel_summaries),
            max_parallel_subjects: std::env::var("LIFELOG_MAX_PARALLEL_SUBJECTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_parallel_subjects),
            summary_cooldown: Duration::from_millis(
                std::env::var("LIFELOG_SUMMARY_COOLDOWN_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
            ),
            fill_gaps: std::env::var("LIFELOG_FILL_GAPS")
                .ok()
                .map(|s| parse_flag(&s))
                .unwrap_or(defaults.fill_gaps),
            bucket_retry: defaults.bucket_retry.with_max_retries(
                std::env::var("LIFELOG_BUCKET_RETRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            ),
            training_output: std::env::var("LIFELOG_TRAINING_OUTPUT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            training_levels: std::env::var("LIFELOG_TRAINING_LEVELS")
                .ok()
                .map(|s| {
                    s.split(',')
                        .filter_map(|name| name.trim().parse().ok())
                        .collect()
                })
                .unwrap_or(defaults.training_levels),
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> WorkerResult<()> {
        self.chain.validate()?;

        if self.max_parallel_summaries == 0 {
            return Err(WorkerError::config_error(
                "LIFELOG_MAX_PARALLEL_SUMMARIES must be at least 1",
            ));
        }
        if self.max_parallel_subjects == 0 {
            return Err(WorkerError::config_error(
                "LIFELOG_MAX_PARALLEL_SUBJECTS must be at least 1",
            ));
        }

        // Both become file names; route them through the same check the store uses.
        self.layout()
            .leaf(&SubjectId::new("probe"))
            .map_err(|e| WorkerError::config_error(format!("leaf store: {}", e)))?;
        lifelog_storage::StoreId::new([self.terminal_label.as_str()])
            .map_err(|e| WorkerError::config_error(format!("terminal label: {}", e)))?;

        for subject in &self.subjects {
            lifelog_storage::StoreId::new([subject.as_str()])
                .map_err(|e| WorkerError::config_error(format!("subject: {}", e)))?;
        }

        Ok(())
    }

    pub fn layout(&self) -> StoreLayout {
        StoreLayout::with_leaf_store(self.leaf_store.clone())
    }
}

/// Keep only the named per-subject levels of `chain`; the terminal level stays.
///
/// Unknown names are ignored. An empty selection is left for `validate` to reject.
fn select_levels(chain: &LevelChain, list: &str) -> LevelChain {
    let wanted: Vec<Level> = list
        .split(',')
        .filter_map(|name| name.trim().parse().ok())
        .collect();

    LevelChain {
        levels: chain
            .levels
            .iter()
            .filter(|spec| wanted.contains(&spec.level))
            .cloned()
            .collect(),
        terminal: chain.terminal.clone(),
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
