//! Canonical timestamp parsing and formatting.
//!
//! Two representations are used across the pipeline:
//! - `YYYY-MM-DD_HH-MM-SS` for record keys (one file name per record)
//! - `YYYY-MM-DD HH:MM:SS` for the human-readable form embedded in prompts
//!
//! Timestamps carry second precision only.

use chrono::{NaiveDateTime, Timelike};
use thiserror::Error;

/// `strftime` pattern of a record key.
pub const KEY_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// `strftime` pattern used when a timestamp is shown to the summarizer.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Sentinel instant assigned to undated (label) records so they sort first.
pub const UNDATED: NaiveDateTime = NaiveDateTime::MIN;

/// Length of a canonical key (`2024-03-04_09-05-00`).
const KEY_LEN: usize = 19;

/// Parse a record key as a canonical timestamp.
///
/// The parse is strict: the input must be exactly what [`format_key`] would
/// produce for the parsed instant. `2024-3-4_9-5-0` is rejected.
///
/// # Examples
/// ```
/// use lifelog_models::timestamp::{parse_key, format_key};
/// let ts = parse_key("2024-03-04_09-05-00").unwrap();
/// assert_eq!(format_key(ts), "2024-03-04_09-05-00");
/// assert!(parse_key("Monday").is_err());
/// ```
pub fn parse_key(key: &str) -> Result<NaiveDateTime, TimestampError> {
    if key.is_empty() {
        return Err(TimestampError::Empty);
    }
    if key.len() != KEY_LEN {
        return Err(TimestampError::InvalidFormat(key.to_string()));
    }

    let parsed = NaiveDateTime::parse_from_str(key, KEY_FORMAT)
        .map_err(|_| TimestampError::InvalidFormat(key.to_string()))?;

    let canonical = format_key(parsed);
    if canonical != key {
        return Err(TimestampError::NonCanonical {
            input: key.to_string(),
            canonical,
        });
    }

    Ok(parsed)
}

/// Format an instant as a record key.
pub fn format_key(ts: NaiveDateTime) -> String {
    ts.format(KEY_FORMAT).to_string()
}

/// Format an instant for display inside a prompt.
pub fn format_display(ts: NaiveDateTime) -> String {
    ts.format(DISPLAY_FORMAT).to_string()
}

/// Drop sub-second precision.
pub fn truncate_to_seconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// Timestamp parsing error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("Timestamp cannot be empty")]
    Empty,

    #[error("Invalid timestamp '{0}', expected YYYY-MM-DD_HH-MM-SS")]
    InvalidFormat(String),

    #[error("Timestamp '{input}' is not canonical (expected '{canonical}')")]
    NonCanonical { input: String, canonical: String },
}
