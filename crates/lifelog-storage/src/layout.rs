//! Mapping from (subject, level) to store ids.
//!
//! ```text
//! <subject>/raw_summaries/          leaf captions, one per frame
//! <subject>/<level>_summaries/      per-subject level outputs
//! <fold level>_summaries/<subject>  cross-subject fold, label keys
//! <terminal>_summaries/<label>      terminal record
//! ```

use lifelog_models::{Level, SubjectId};

use crate::error::StorageResult;
use crate::store::StoreId;

/// Default name of the leaf (caption) store.
pub const DEFAULT_LEAF_STORE: &str = "raw_summaries";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    leaf_store: String,
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self {
            leaf_store: DEFAULT_LEAF_STORE.to_string(),
        }
    }
}

impl StoreLayout {
    /// Layout whose leaf captions live under a custom folder name,
    /// e.g. captions produced by a different captioning model.
    pub fn with_leaf_store(leaf_store: impl Into<String>) -> Self {
        Self {
            leaf_store: leaf_store.into(),
        }
    }

    pub fn leaf_store_name(&self) -> &str {
        &self.leaf_store
    }

    /// Leaf captions of a subject.
    pub fn leaf(&self, subject: &SubjectId) -> StorageResult<StoreId> {
        StoreId::new([subject.as_str(), self.leaf_store.as_str()])
    }

    /// Output of `level` for a subject.
    pub fn level(&self, subject: &SubjectId, level: Level) -> StorageResult<StoreId> {
        StoreId::new([subject.as_str().to_string(), level.store_name()])
    }

    /// Input of `level` for a subject: the predecessor's output, or the leaf store.
    pub fn input(&self, subject: &SubjectId, predecessor: Option<Level>) -> StorageResult<StoreId> {
        match predecessor {
            Some(level) => self.level(subject, level),
            None => self.leaf(subject),
        }
    }

    /// Cross-subject store holding one label record per subject.
    pub fn folded(&self, level: Level) -> StorageResult<StoreId> {
        StoreId::new([level.store_name()])
    }

    /// Store of the terminal record.
    pub fn terminal(&self, level: Level) -> StorageResult<StoreId> {
        StoreId::new([level.store_name()])
    }
}
