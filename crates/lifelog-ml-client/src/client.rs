//! Chat-completions summarization client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use lifelog_models::{Level, Record};

use crate::error::{MlError, MlResult};
use crate::prompt::PromptBook;
use crate::service::SummarizationService;
use crate::types::{ChatMessage, ChatRequest, ChatResponse};

/// Configuration for the summarizer.
#[derive(Clone)]
pub struct SummarizerConfig {
    /// Base URL of the chat-completions API (without `/chat/completions`)
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Completion token limit per summary
    pub max_tokens: u32,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries for transient failures
    pub max_retries: u32,
    /// First backoff delay (doubles each attempt)
    pub retry_base_delay: Duration,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1000,
            timeout: Duration::from_secs(120),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl fmt::Debug for SummarizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummarizerConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay", &self.retry_base_delay)
            .finish()
    }
}

impl SummarizerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> MlResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("OPENAI_API_KEY")
                .map_err(|_| MlError::config("OPENAI_API_KEY not set"))?,
            model: std::env::var("LIFELOG_SUMMARY_MODEL").unwrap_or(defaults.model),
            max_tokens: std::env::var("LIFELOG_SUMMARY_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_tokens),
            timeout: Duration::from_secs(
                std::env::var("LIFELOG_SUMMARY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            max_retries: std::env::var("LIFELOG_SUMMARY_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_base_delay: defaults.retry_base_delay,
        })
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.retry_base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(Duration::from_secs(30))
    }
}

/// Summarizer backed by an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiSummarizer {
    http: Client,
    config: SummarizerConfig,
    prompts: PromptBook,
}

impl OpenAiSummarizer {
    pub fn new(config: SummarizerConfig, prompts: PromptBook) -> MlResult<Self> {
        if config.api_key.is_empty() {
            return Err(MlError::config("API key is empty"));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self {
            http,
            config,
            prompts,
        })
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Send one prompt and return the completion text.
    async fn complete(&self, prompt: &str) -> MlResult<String> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MlError::Timeout(self.config.timeout.as_secs())
                } else {
                    MlError::Network(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::from_http_status(status, &body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| MlError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let choice = chat
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| MlError::rejected("no choices in response"))?;

        if let Some(refusal) = choice.message.refusal.filter(|r| !r.is_empty()) {
            return Err(MlError::rejected(format!("model refused: {}", refusal)));
        }
        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(MlError::rejected("completion blocked by content filter"));
        }

        match choice.message.content {
            Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            _ => Err(MlError::rejected("empty completion")),
        }
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.delay_for_attempt(attempt);
                    warn!(
                        "Summarization request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| MlError::unavailable("Unknown error")))
    }
}

#[async_trait]
impl SummarizationService for OpenAiSummarizer {
    async fn summarize(&self, members: &[Record], level: Level) -> MlResult<String> {
        let prompt = self.prompts.render(level, members)?;

        debug!(
            level = %level,
            members = members.len(),
            model = %self.config.model,
            "Sending summarization request"
        );

        self.with_retry(|| self.complete(&prompt)).await
    }
}
