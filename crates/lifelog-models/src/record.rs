//! Timestamped text records.

use std::fmt;

use chrono::NaiveDateTime;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::timestamp::{self, UNDATED};

/// Key of a record inside a store.
///
/// A key is either a canonical timestamp or a free-form label. Labels are
/// used for the few named summaries (one per subject, one per week) and
/// carry the [`UNDATED`] sentinel as their instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum RecordKey {
    Timestamp(NaiveDateTime),
    Label(String),
}

impl RecordKey {
    /// Interpret a store entry name.
    ///
    /// Never fails: anything that is not a canonical timestamp is a label.
    pub fn parse(name: &str) -> Self {
        match timestamp::parse_key(name) {
            Ok(ts) => RecordKey::Timestamp(ts),
            Err(_) => RecordKey::Label(name.to_string()),
        }
    }

    /// Key for an instant, truncated to whole seconds.
    pub fn at(ts: NaiveDateTime) -> Self {
        RecordKey::Timestamp(timestamp::truncate_to_seconds(ts))
    }

    pub fn label(label: impl Into<String>) -> Self {
        RecordKey::Label(label.into())
    }

    /// Instant used for ordering and bucketing.
    pub fn timestamp(&self) -> NaiveDateTime {
        match self {
            RecordKey::Timestamp(ts) => *ts,
            RecordKey::Label(_) => UNDATED,
        }
    }

    /// Entry name used by stores.
    pub fn as_name(&self) -> String {
        match self {
            RecordKey::Timestamp(ts) => timestamp::format_key(*ts),
            RecordKey::Label(label) => label.clone(),
        }
    }

    pub fn is_label(&self) -> bool {
        matches!(self, RecordKey::Label(_))
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_name())
    }
}

impl From<NaiveDateTime> for RecordKey {
    fn from(ts: NaiveDateTime) -> Self {
        RecordKey::at(ts)
    }
}

/// One unit of timeline text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Record {
    pub key: RecordKey,
    pub text: String,
}

impl Record {
    pub fn new(key: RecordKey, text: impl Into<String>) -> Self {
        Self {
            key,
            text: text.into(),
        }
    }

    /// Record keyed by an instant.
    pub fn at(ts: NaiveDateTime, text: impl Into<String>) -> Self {
        Self::new(RecordKey::at(ts), text)
    }

    /// Record keyed by a label (undated).
    pub fn labeled(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(RecordKey::label(label), text)
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.key.timestamp()
    }
}
