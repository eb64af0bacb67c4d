//! JSONL chat export of produced summaries for fine-tuning.
//!
//! One example per record: a system line naming the summary kind, a question
//! phrased for the record's level and instant, and the record text as the
//! assistant answer.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use lifelog_ml_client::types::ChatMessage;
use lifelog_models::{Level, LevelChain, Record, RecordKey, SubjectId};
use lifelog_storage::{RecordStore, StoreId, StoreLayout};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};

/// One chat-format training example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub messages: Vec<ChatMessage>,
}

pub struct TrainingExporter<S> {
    store: Arc<S>,
    layout: StoreLayout,
    chain: LevelChain,
    persona: String,
    subjects: Vec<SubjectId>,
    levels: Vec<Level>,
}

impl<S: RecordStore> TrainingExporter<S> {
    pub fn new(config: &PipelineConfig, store: Arc<S>) -> Self {
        Self {
            store,
            layout: config.layout(),
            chain: config.chain.clone(),
            persona: config.persona.clone(),
            subjects: config.subjects.clone(),
            levels: config.training_levels.clone(),
        }
    }

    /// Collect examples for every configured level, in the configured order.
    ///
    /// The fold level reads the cross-subject labeled store and the terminal
    /// level reads the terminal store; other levels read each subject's store.
    pub async fn collect(&self) -> WorkerResult<Vec<TrainingExample>> {
        let fold_level = self.chain.fold_level().map(|spec| spec.level);
        let mut examples = Vec::new();

        for &level in &self.levels {
            if Some(level) == fold_level {
                let store = self.layout.folded(level)?;
                examples.extend(self.examples_from(&store, level).await?);
            } else if level == self.chain.terminal.level {
                let store = self.layout.terminal(level)?;
                examples.extend(self.examples_from(&store, level).await?);
            } else if self.chain.spec(level).is_some() {
                for subject in &self.subjects {
                    let store = self.layout.level(subject, level)?;
                    examples.extend(self.examples_from(&store, level).await?);
                }
            } else {
                debug!(level = %level, "Level not in chain, nothing to export");
            }
        }

        Ok(examples)
    }

    /// Write all examples as JSON lines. Returns the number of examples.
    pub async fn write_jsonl(&self, path: &Path) -> WorkerResult<usize> {
        let examples = self.collect().await?;

        let mut body = String::new();
        for example in &examples {
            body.push_str(&serde_json::to_string(example)?);
            body.push('\n');
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file_name = path
            .file_name()
            .ok_or_else(|| WorkerError::export_failed(format!("{} has no file name", path.display())))?;
        let temp_path = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));
        tokio::fs::write(&temp_path, body).await?;
        tokio::fs::rename(&temp_path, path).await?;

        info!(
            path = %path.display(),
            examples = examples.len(),
            "Training export written"
        );
        Ok(examples.len())
    }

    async fn examples_from(&self, store: &StoreId, level: Level) -> WorkerResult<Vec<TrainingExample>> {
        let records = self.store.list_or_empty(store).await?;
        let width = self.chain.spec(level).map(|spec| spec.width());

        Ok(records
            .iter()
            .filter(|record| !record.text.trim().is_empty())
            .filter_map(|record| {
                let question = self.question(level, record, width)?;
                Some(TrainingExample {
                    messages: vec![
                        ChatMessage::system(self.system_prompt(level)),
                        ChatMessage::user(question),
                        ChatMessage::assistant(record.text.trim()),
                    ],
                })
            })
            .collect())
    }

    fn system_prompt(&self, level: Level) -> String {
        format!(
            "You are a personal timeline assistant trained on {}'s {} summaries. \
             Answer questions accurately based on past events.",
            self.persona,
            summary_kind(level)
        )
    }

    fn question(&self, level: Level, record: &Record, width: Option<chrono::Duration>) -> Option<String> {
        let persona = &self.persona;
        match &record.key {
            RecordKey::Label(label) if level == self.chain.terminal.level => {
                Some(format!("Summarize {}'s {}.", persona, label))
            }
            RecordKey::Label(label) => Some(format!("Summarize what {} did on {}.", persona, label)),
            RecordKey::Timestamp(ts) => {
                let (time, day, date) = describe(*ts);
                match level {
                    Level::Minute => Some(format!(
                        "What was {} doing at exactly {} on {}, {}?",
                        persona, time, day, date
                    )),
                    Level::TenMinute => Some(format!(
                        "What was {} doing around {} on {}, {}?",
                        persona, time, day, date
                    )),
                    Level::Hour => {
                        let end = width
                            .and_then(|w| ts.checked_add_signed(w))
                            .map(|end| end.format("%I:%M %p").to_string())?;
                        Some(format!(
                            "Summarize {}'s main activities between {} and {} on {}, {}.",
                            persona, time, end, day, date
                        ))
                    }
                    Level::Day => Some(format!("Summarize what {} did on {}, {}.", persona, day, date)),
                    Level::Week => Some(format!(
                        "Summarize {}'s week starting {}, {}.",
                        persona, day, date
                    )),
                }
            }
        }
    }
}

fn summary_kind(level: Level) -> &'static str {
    match level {
        Level::Minute => "minute",
        Level::TenMinute => "10-minute",
        Level::Hour => "hourly",
        Level::Day => "daily",
        Level::Week => "weekly",
    }
}

/// `("09:05 AM", "Monday", "March 04, 2024")`
fn describe(ts: NaiveDateTime) -> (String, String, String) {
    (
        ts.format("%I:%M %p").to_string(),
        ts.format("%A").to_string(),
        ts.format("%B %d, %Y").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ts;
    use lifelog_storage::{FsRecordStore, MemoryRecordStore};

    fn config(levels: Vec<Level>) -> PipelineConfig {
        PipelineConfig {
            subjects: vec![SubjectId::new("Monday")],
            persona: "Ada".to_string(),
            training_levels: levels,
            ..Default::default()
        }
    }

    async fn put(store: &MemoryRecordStore, segments: &[&str], key: RecordKey, text: &str) {
        let id = StoreId::new(segments.iter().copied()).unwrap();
        store.put(&id, &key, text).await.unwrap();
    }

    #[test]
    fn test_describe_formats() {
        let (time, day, date) = describe(ts(9, 5, 0));
        assert_eq!(time, "09:05 AM");
        assert_eq!(day, "Monday");
        assert_eq!(date, "March 04, 2024");
    }

    #[tokio::test]
    async fn test_questions_per_level() {
        let store = Arc::new(MemoryRecordStore::new());
        put(&store, &["Monday", "minute_summaries"], RecordKey::at(ts(9, 5, 0)), "typing").await;
        put(&store, &["Monday", "hour_summaries"], RecordKey::at(ts(14, 0, 0)), "meetings\n").await;
        put(&store, &["day_summaries"], RecordKey::label("Monday"), "a busy day").await;
        put(&store, &["week_summaries"], RecordKey::label("week"), "a busy week").await;

        let exporter = TrainingExporter::new(
            &config(vec![Level::Minute, Level::Hour, Level::Day, Level::Week]),
            store.clone(),
        );
        let examples = exporter.collect().await.unwrap();
        assert_eq!(examples.len(), 4);

        let questions: Vec<&str> = examples.iter().map(|e| e.messages[1].content.as_str()).collect();
        assert_eq!(
            questions,
            vec![
                "What was Ada doing at exactly 09:05 AM on Monday, March 04, 2024?",
                "Summarize Ada's main activities between 02:00 PM and 03:00 PM on Monday, March 04, 2024.",
                "Summarize what Ada did on Monday.",
                "Summarize Ada's week.",
            ]
        );

        assert_eq!(examples[1].messages[0].role, "system");
        assert!(examples[1].messages[0].content.contains("Ada's hourly summaries"));
        assert_eq!(examples[1].messages[2], ChatMessage::assistant("meetings"));
    }

    #[tokio::test]
    async fn test_missing_stores_export_nothing() {
        let store = Arc::new(MemoryRecordStore::new());
        let exporter = TrainingExporter::new(&config(vec![Level::TenMinute, Level::Day]), store);
        assert!(exporter.collect().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsRecordStore::new(dir.path()));
        let minutes = StoreId::new(["Monday", "ten_minute_summaries"]).unwrap();
        store.put(&minutes, &RecordKey::at(ts(9, 0, 0)), "reading").await.unwrap();
        store.put(&minutes, &RecordKey::at(ts(9, 10, 0)), "writing").await.unwrap();

        let exporter = TrainingExporter::new(&config(vec![Level::TenMinute]), store);
        let path = dir.path().join("export").join("training.jsonl");
        let written = exporter.write_jsonl(&path).await.unwrap();
        assert_eq!(written, 2);

        let body = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<TrainingExample> = body
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].messages[2].content, "reading");
        assert_eq!(
            lines[1].messages[1].content,
            "What was Ada doing around 09:10 AM on Monday, March 04, 2024?"
        );
    }
}
