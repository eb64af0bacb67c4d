//! Scripted summarizer for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use lifelog_ml_client::{MlError, MlResult, PromptBook, SummarizationService};
use lifelog_models::{Level, LevelChain, Record};

type Call = (Level, Vec<String>);

/// Records every call and fails buckets on request.
///
/// Members are rendered with the default prompt book first, so buckets the
/// real client would refuse fail here too.
///
/// Failures are keyed by level and the first member's key name, which is also
/// the bucket's output key for dated buckets.
#[derive(Default)]
pub(crate) struct FakeSummarizer {
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<(Level, String), (u32, fn() -> MlError)>>,
}

impl FakeSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_bucket(&self, level: Level, first_key: &str, times: u32, error: fn() -> MlError) {
        self.failures
            .lock()
            .unwrap()
            .insert((level, first_key.to_string()), (times, error));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, level: Level) -> usize {
        self.calls().iter().filter(|(l, _)| *l == level).count()
    }

    pub fn text_for(level: Level, members: usize, first_key: &str) -> String {
        format!("{} summary of {} entries from {}", level, members, first_key)
    }
}

#[async_trait]
impl SummarizationService for FakeSummarizer {
    async fn summarize(&self, members: &[Record], level: Level) -> MlResult<String> {
        let names: Vec<String> = members.iter().map(|m| m.key.as_name()).collect();
        let first = names.first().cloned().unwrap_or_default();
        self.calls.lock().unwrap().push((level, names));
        PromptBook::from_chain(&LevelChain::default(), "tester").render(level, members)?;

        if let Some((remaining, error)) = self.failures.lock().unwrap().get_mut(&(level, first.clone())) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(error());
            }
        }

        Ok(Self::text_for(level, members.len(), &first))
    }
}

pub(crate) fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 4)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

pub(crate) fn unavailable() -> MlError {
    MlError::unavailable("HTTP 503")
}

pub(crate) fn rejected() -> MlError {
    MlError::rejected("content policy")
}
