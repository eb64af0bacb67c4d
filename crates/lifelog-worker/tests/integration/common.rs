//! Shared fixtures.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};

use lifelog_ml_client::{MlResult, SummarizationService};
use lifelog_models::{Level, Record, SubjectId};
use lifelog_storage::{RecordStore, StoreLayout};
use lifelog_worker::{PipelineConfig, RetryConfig};

/// Summarizer that answers deterministically and counts calls per level.
#[derive(Default)]
pub struct CountingSummarizer {
    calls: Mutex<HashMap<Level, usize>>,
}

impl CountingSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self, level: Level) -> usize {
        self.calls.lock().unwrap().get(&level).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl SummarizationService for CountingSummarizer {
    async fn summarize(&self, members: &[Record], level: Level) -> MlResult<String> {
        *self.calls.lock().unwrap().entry(level).or_insert(0) += 1;
        let first = members.first().map(|m| m.key.as_name()).unwrap_or_default();
        Ok(format!("{} summary of {} entries from {}", level, members.len(), first))
    }
}

pub fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

/// `count` captions starting at `start`, `step_secs` apart.
pub fn captions(start: NaiveDateTime, count: i64, step_secs: i64) -> Vec<Record> {
    (0..count)
        .map(|i| {
            Record::at(
                start + ChronoDuration::seconds(i * step_secs),
                format!("frame {} caption", i),
            )
        })
        .collect()
}

pub async fn seed_leaves<S: RecordStore>(store: &S, subject: &str, records: &[Record]) {
    let leaf = StoreLayout::default().leaf(&SubjectId::new(subject)).unwrap();
    for record in records {
        store.put(&leaf, &record.key, &record.text).await.unwrap();
    }
}

pub fn config(subjects: &[&str]) -> PipelineConfig {
    PipelineConfig {
        subjects: subjects.iter().map(|s| SubjectId::new(*s)).collect(),
        bucket_retry: RetryConfig::new("bucket_retry")
            .with_max_retries(1)
            .with_base_delay(Duration::from_millis(1)),
        ..Default::default()
    }
}
