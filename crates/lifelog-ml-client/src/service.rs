//! The summarization service seam.

use std::sync::Arc;

use async_trait::async_trait;

use lifelog_models::{Level, Record};

use crate::error::MlResult;

/// Synthesizes one text from an ordered run of records.
///
/// Implementations receive members in ascending timestamp order and are
/// treated as slow, fallible and idempotent per bucket.
#[async_trait]
pub trait SummarizationService: Send + Sync {
    async fn summarize(&self, members: &[Record], level: Level) -> MlResult<String>;
}

#[async_trait]
impl<T: SummarizationService + ?Sized> SummarizationService for Arc<T> {
    async fn summarize(&self, members: &[Record], level: Level) -> MlResult<String> {
        (**self).summarize(members, level).await
    }
}
