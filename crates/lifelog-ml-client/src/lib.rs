//! Summarization service client for the lifelog hierarchy.
//!
//! This crate provides the `SummarizationService` seam used by the
//! aggregation engine, per-level prompt rendering, and an HTTP client for
//! OpenAI-compatible chat-completions endpoints.

pub mod client;
pub mod error;
pub mod prompt;
pub mod service;
pub mod types;

pub use client::{OpenAiSummarizer, SummarizerConfig};
pub use error::{MlError, MlResult};
pub use prompt::{format_entries, PromptBook, DEFAULT_PERSONA};
pub use service::SummarizationService;
