//! Summary levels and the configurable level chain.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder replaced with the rendered member entries.
pub const ENTRIES_PLACEHOLDER: &str = "{entries}";

/// Placeholder replaced with the name of the person being summarized.
pub const PERSONA_PLACEHOLDER: &str = "{persona}";

/// A stage of the summary hierarchy.
///
/// Variants are declared in hierarchy order, so `Ord` follows the chain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Minute,
    TenMinute,
    Hour,
    Day,
    Week,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Minute,
        Level::TenMinute,
        Level::Hour,
        Level::Day,
        Level::Week,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Minute => "minute",
            Level::TenMinute => "ten_minute",
            Level::Hour => "hour",
            Level::Day => "day",
            Level::Week => "week",
        }
    }

    /// Folder name of this level's output store.
    pub fn store_name(&self) -> String {
        format!("{}_summaries", self.as_str())
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .iter()
            .copied()
            .find(|level| level.as_str() == s.trim())
            .ok_or_else(|| LevelError::Unknown(s.to_string()))
    }
}

/// One configured stage: bucket width plus synthesis prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LevelSpec {
    pub level: Level,
    /// Nominal bucket width in minutes.
    pub width_minutes: u32,
    /// Prompt with `{persona}` and `{entries}` placeholders.
    pub prompt_template: String,
}

impl LevelSpec {
    pub fn new(level: Level, width_minutes: u32, prompt_template: impl Into<String>) -> Self {
        Self {
            level,
            width_minutes,
            prompt_template: prompt_template.into(),
        }
    }

    pub fn width(&self) -> Duration {
        Duration::minutes(i64::from(self.width_minutes))
    }
}

/// The ordered level chain plus the terminal (cross-subject) level.
///
/// Each level in `levels` reads the previous level's store for the same
/// subject. The last entry is the per-subject top level whose outputs are
/// folded across subjects and fed to `terminal` as a single bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LevelChain {
    pub levels: Vec<LevelSpec>,
    pub terminal: LevelSpec,
}

impl Default for LevelChain {
    fn default() -> Self {
        Self {
            levels: vec![
                LevelSpec::new(
                    Level::Minute,
                    1,
                    "You are summarizing short text logs with timestamps. Each log describes \
                     what {persona} was doing at the given timestamp. Generate a summary for \
                     the following minute-long logs:\n\n{entries}",
                ),
                LevelSpec::new(
                    Level::TenMinute,
                    10,
                    "You are summarizing a sequence of minute summaries over a 10-minute \
                     period. These are summaries of what {persona} was doing. Preserve key \
                     trends:\n\n{entries}",
                ),
                LevelSpec::new(
                    Level::Hour,
                    60,
                    "You are summarizing a sequence of ten-minute summaries over an hour. \
                     These are summaries of what {persona} was doing. Preserve key trends \
                     over time:\n\n{entries}",
                ),
                LevelSpec::new(
                    Level::Day,
                    1440,
                    "You are summarizing a sequence of hourly summaries over a day. These are \
                     summaries of what {persona} was doing in that hour. Identify patterns, \
                     trends, and key highlights:\n\n{entries}",
                ),
            ],
            terminal: LevelSpec::new(
                Level::Week,
                10080,
                "You are summarizing a week's worth of daily summaries of {persona}. Extract \
                 key themes and trends while maintaining chronological context:\n\n{entries}",
            ),
        }
    }
}

impl LevelChain {
    /// Check ordering, widths and templates.
    pub fn validate(&self) -> Result<(), LevelError> {
        if self.levels.is_empty() {
            return Err(LevelError::EmptyChain);
        }

        for pair in self.levels.windows(2) {
            if pair[1].level <= pair[0].level {
                return Err(LevelError::OutOfOrder(pair[0].level, pair[1].level));
            }
        }

        for spec in self.levels.iter().chain(std::iter::once(&self.terminal)) {
            if spec.width_minutes == 0 {
                return Err(LevelError::ZeroWidth(spec.level));
            }
            if !spec.prompt_template.contains(ENTRIES_PLACEHOLDER) {
                return Err(LevelError::MissingEntries(spec.level));
            }
        }

        if let Some(last) = self.levels.last() {
            if self.terminal.level <= last.level {
                return Err(LevelError::OutOfOrder(last.level, self.terminal.level));
            }
        }

        Ok(())
    }

    /// Per-subject top level, whose records are folded across subjects.
    pub fn fold_level(&self) -> Option<&LevelSpec> {
        self.levels.last()
    }

    pub fn spec(&self, level: Level) -> Option<&LevelSpec> {
        self.levels
            .iter()
            .chain(std::iter::once(&self.terminal))
            .find(|spec| spec.level == level)
    }

    pub fn template_for(&self, level: Level) -> Option<&str> {
        self.spec(level).map(|spec| spec.prompt_template.as_str())
    }

    /// Level whose output store feeds `level`, or `None` for the first level.
    pub fn predecessor(&self, level: Level) -> Option<Level> {
        let index = self.levels.iter().position(|spec| spec.level == level)?;
        index.checked_sub(1).map(|i| self.levels[i].level)
    }
}

/// Level parsing / chain validation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelError {
    #[error("Unknown level: {0}")]
    Unknown(String),

    #[error("Level chain is empty")]
    EmptyChain,

    #[error("Level {1} must come after {0}")]
    OutOfOrder(Level, Level),

    #[error("Level {0} has zero width")]
    ZeroWidth(Level),

    #[error("Prompt template for {0} has no {{entries}} placeholder")]
    MissingEntries(Level),
}
