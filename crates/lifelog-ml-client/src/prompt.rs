//! Prompt rendering for each summary level.

use std::collections::HashMap;

use lifelog_models::level::{ENTRIES_PLACEHOLDER, PERSONA_PLACEHOLDER};
use lifelog_models::timestamp::format_display;
use lifelog_models::{Level, LevelChain, Record, RecordKey};

use crate::error::{MlError, MlResult};

/// Default subject of the prompts.
pub const DEFAULT_PERSONA: &str = "the camera wearer";

/// Per-level prompt templates bound to a persona.
#[derive(Debug, Clone)]
pub struct PromptBook {
    templates: HashMap<Level, String>,
    persona: String,
}

impl PromptBook {
    pub fn from_chain(chain: &LevelChain, persona: impl Into<String>) -> Self {
        let templates = chain
            .levels
            .iter()
            .chain(std::iter::once(&chain.terminal))
            .map(|spec| (spec.level, spec.prompt_template.clone()))
            .collect();

        Self {
            templates,
            persona: persona.into(),
        }
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Build the prompt for one bucket.
    ///
    /// Members must be non-empty and in non-decreasing timestamp order.
    pub fn render(&self, level: Level, members: &[Record]) -> MlResult<String> {
        let template = self
            .templates
            .get(&level)
            .ok_or_else(|| MlError::invalid_request(format!("no prompt template for {}", level)))?;

        if members.is_empty() {
            return Err(MlError::invalid_request("bucket has no members"));
        }
        if let Some(pair) = members
            .windows(2)
            .find(|pair| pair[1].timestamp() < pair[0].timestamp())
        {
            return Err(MlError::invalid_request(format!(
                "members out of order: {} after {}",
                pair[1].key, pair[0].key
            )));
        }

        Ok(template
            .replace(PERSONA_PLACEHOLDER, &self.persona)
            .replace(ENTRIES_PLACEHOLDER, &format_entries(members)))
    }
}

/// Render members as `[YYYY-MM-DD HH:MM:SS]\n<text>` blocks joined by newlines.
///
/// Undated records show their label instead of the sentinel instant.
pub fn format_entries(members: &[Record]) -> String {
    members
        .iter()
        .map(|record| {
            let stamp = match &record.key {
                RecordKey::Timestamp(ts) => format_display(*ts),
                RecordKey::Label(label) => label.clone(),
            };
            format!("[{}]\n{}", stamp, record.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
