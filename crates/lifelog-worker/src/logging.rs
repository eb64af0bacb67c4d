//! Structured stage logging utilities.
//!
//! Every line carries the run id, the subject and the level being worked on,
//! so one run's output can be filtered out of interleaved concurrent subjects.

use tracing::{error, info, warn, Span};

use lifelog_models::{Level, RunId, SubjectId};

/// Subject label used for stages that span all subjects (fold, terminal).
pub const ALL_SUBJECTS: &str = "*";

/// Logger for one (subject, level) stage of a run.
#[derive(Debug, Clone)]
pub struct StageLogger {
    run_id: String,
    subject: String,
    stage: String,
}

impl StageLogger {
    /// Create a logger for a per-subject level.
    pub fn new(run_id: &RunId, subject: &SubjectId, level: Level) -> Self {
        Self {
            run_id: run_id.to_string(),
            subject: subject.to_string(),
            stage: level.to_string(),
        }
    }

    /// Create a logger for a cross-subject stage such as `fold` or `terminal`.
    pub fn cross_subject(run_id: &RunId, stage: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            subject: ALL_SUBJECTS.to_string(),
            stage: stage.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            subject = %self.subject,
            stage = %self.stage,
            "Stage started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            subject = %self.subject,
            stage = %self.stage,
            "Stage progress: {}", message
        );
    }

    /// Log a skipped stage. Skips are expected, not failures.
    pub fn log_skip(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            subject = %self.subject,
            stage = %self.stage,
            "Stage skipped: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            subject = %self.subject,
            stage = %self.stage,
            "Stage warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            subject = %self.subject,
            stage = %self.stage,
            "Stage error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            subject = %self.subject,
            stage = %self.stage,
            "Stage completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Tracing span for this stage.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "stage",
            run_id = %self.run_id,
            subject = %self.subject,
            stage = %self.stage
        )
    }
}
