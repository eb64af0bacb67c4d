//! Buckets: contiguous runs of records grouped for joint summarization.

use chrono::{Duration, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::record::{Record, RecordKey};

/// A bucket anchored at its first member's timestamp.
///
/// Every member lies in `[start, start + width)`. Buckets are derived from
/// the data, not aligned to wall-clock boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Bucket {
    pub start: NaiveDateTime,
    /// Width in whole seconds.
    pub width_secs: i64,
    pub members: Vec<Record>,
}

impl Bucket {
    /// Open a bucket with its first member.
    pub fn open(first: Record, width: Duration) -> Self {
        Self {
            start: first.timestamp(),
            width_secs: width.num_seconds(),
            members: vec![first],
        }
    }

    pub fn width(&self) -> Duration {
        Duration::seconds(self.width_secs)
    }

    /// Exclusive upper bound, or `None` when it overflows the calendar.
    pub fn end(&self) -> Option<NaiveDateTime> {
        self.start.checked_add_signed(self.width())
    }

    /// True when `record` falls inside `[start, start + width)`.
    pub fn accepts(&self, record: &Record) -> bool {
        match self.end() {
            Some(end) => record.timestamp() < end,
            None => true,
        }
    }

    pub fn push(&mut self, record: Record) {
        self.members.push(record);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Single-member buckets are emitted verbatim without synthesis.
    pub fn is_passthrough(&self) -> bool {
        self.members.len() == 1
    }

    /// Key of the record this bucket produces.
    ///
    /// Normally the canonical start timestamp. A bucket opened by an undated
    /// (label) record keeps that label, since the sentinel instant has no
    /// meaningful canonical form.
    pub fn output_key(&self) -> RecordKey {
        match self.members.first().map(|m| &m.key) {
            Some(RecordKey::Label(label)) => RecordKey::Label(label.clone()),
            _ => RecordKey::Timestamp(self.start),
        }
    }

    /// Text of the single member of a passthrough bucket.
    pub fn passthrough_text(&self) -> Option<&str> {
        if self.is_passthrough() {
            self.members.first().map(|m| m.text.as_str())
        } else {
            None
        }
    }
}
