//! Summary hierarchy worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lifelog_ml_client::{OpenAiSummarizer, PromptBook, SummarizerConfig};
use lifelog_storage::FsRecordStore;
use lifelog_worker::{HierarchyDriver, PipelineConfig, TerminalOutcome, TrainingExporter};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("Failed to install rustls crypto provider");
        std::process::exit(1);
    }

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lifelog=info,info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting lifelog-worker");

    // Load configuration
    let config = PipelineConfig::from_env();
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }
    if config.subjects.is_empty() {
        error!("LIFELOG_SUBJECTS is empty, nothing to aggregate");
        std::process::exit(1);
    }
    info!("Pipeline config: {:?}", config);

    // Create summarization client
    let summarizer_config = match SummarizerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load summarizer config: {}", e);
            std::process::exit(1);
        }
    };
    let prompts = PromptBook::from_chain(&config.chain, config.persona.clone());
    let summarizer = match OpenAiSummarizer::new(summarizer_config, prompts) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create summarizer: {}", e);
            std::process::exit(1);
        }
    };

    let store = Arc::new(FsRecordStore::new(config.root_dir.clone()));

    let driver = match HierarchyDriver::new(config.clone(), store.clone(), summarizer) {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to create hierarchy driver: {}", e);
            std::process::exit(1);
        }
    };

    let report = match driver.run().await {
        Ok(r) => r,
        Err(e) => {
            error!("Hierarchy run failed: {}", e);
            std::process::exit(1);
        }
    };

    for failure in report.failures() {
        warn!(rejected = failure.source.is_rejected(), "{}", failure);
    }
    match &report.terminal {
        TerminalOutcome::Written { key, outcome } => info!("Terminal record {} ({:?})", key, outcome),
        TerminalOutcome::Empty => info!("No folded records, terminal record not produced"),
        TerminalOutcome::Blocked => warn!("Terminal record blocked by an incomplete fold"),
        TerminalOutcome::Failed(e) => error!("Terminal record failed: {}", e),
    }

    if let Some(path) = &config.training_output {
        let exporter = TrainingExporter::new(&config, store);
        match exporter.write_jsonl(path).await {
            Ok(count) => info!("Exported {} training examples to {}", count, path.display()),
            Err(e) => {
                error!("Training export failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    if !report.is_complete() {
        error!(run_id = %report.run_id, "Run finished with failures");
        std::process::exit(2);
    }

    info!(run_id = %report.run_id, "Run complete");
}
