//! Hierarchy runs through the chat-completions client.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lifelog_ml_client::{OpenAiSummarizer, PromptBook, SummarizerConfig};
use lifelog_models::{Level, RecordKey};
use lifelog_storage::{MemoryRecordStore, StoreId};
use lifelog_worker::{HierarchyDriver, LevelOutcome, TerminalOutcome};

use super::common::{at, captions, config, seed_leaves};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "choices": [{
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

fn summarizer_for(server: &MockServer, persona: &str) -> Arc<OpenAiSummarizer> {
    let config = SummarizerConfig {
        base_url: server.uri(),
        api_key: "test-key".to_string(),
        max_retries: 0,
        retry_base_delay: Duration::from_millis(1),
        ..Default::default()
    };
    let prompts = PromptBook::from_chain(&Default::default(), persona);
    Arc::new(OpenAiSummarizer::new(config, prompts).unwrap())
}

#[tokio::test]
async fn test_hierarchy_against_mock_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("  Reading at a desk.  ")))
        .expect(2)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryRecordStore::new());
    // One minute bucket of three captions, then a lone caption.
    seed_leaves(store.as_ref(), "Monday", &captions(at(4, 9, 0, 0), 3, 10)).await;
    seed_leaves(store.as_ref(), "Monday", &captions(at(4, 9, 5, 0), 1, 1)).await;

    let mut config = config(&["Monday"]);
    config.persona = "Ada".to_string();
    let summarizer = summarizer_for(&server, &config.persona);
    let driver = HierarchyDriver::new(config, store.clone(), summarizer).unwrap();
    let report = assert_ok!(driver.run().await);
    assert!(report.is_complete());

    let requests = server.received_requests().await.unwrap();
    let bodies: Vec<serde_json::Value> = requests
        .iter()
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect();

    // Minute bucket first, then the ten-minute bucket over both minute records.
    let minute_prompt = bodies[0]["messages"][0]["content"].as_str().unwrap();
    assert!(minute_prompt.contains("what Ada was doing"));
    assert!(minute_prompt.contains("[2024-03-04 09:00:00]\nframe 0 caption"));
    assert!(minute_prompt.contains("[2024-03-04 09:00:20]\nframe 2 caption"));

    let ten_minute_prompt = bodies[1]["messages"][0]["content"].as_str().unwrap();
    assert!(ten_minute_prompt.contains("10-minute period"));
    assert!(ten_minute_prompt.contains("[2024-03-04 09:00:00]\nReading at a desk."));
    assert!(ten_minute_prompt.contains("[2024-03-04 09:05:00]\nframe 0 caption"));

    let week = store
        .get(
            &StoreId::new(["week_summaries"]).unwrap(),
            &RecordKey::label("week"),
        )
        .await
        .unwrap();
    assert_eq!(week, "Reading at a desk.");
}

#[tokio::test]
async fn test_rejection_is_reported_and_blocks_parents() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "role": "assistant", "content": null },
                "finish_reason": "content_filter"
            }]
        })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryRecordStore::new());
    seed_leaves(store.as_ref(), "Monday", &captions(at(4, 9, 0, 0), 4, 5)).await;

    let config = config(&["Monday"]);
    let summarizer = summarizer_for(&server, &config.persona);
    let driver = HierarchyDriver::new(config, store.clone(), summarizer).unwrap();
    let report = assert_ok!(driver.run().await);

    assert!(!report.is_complete());
    assert_eq!(report.rejected().count(), 1);
    // Rejections are not retried.
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    let monday = report.subject(&"Monday".into()).unwrap();
    assert!(matches!(
        monday.outcome(Level::TenMinute),
        Some(LevelOutcome::Blocked { .. })
    ));
    assert!(matches!(report.terminal, TerminalOutcome::Blocked));
}

/// Full run against the real API. Writes nothing outside a temp directory.
#[tokio::test]
#[ignore = "requires OPENAI_API_KEY"]
async fn test_live_summarization() {
    dotenvy::dotenv().ok();

    let summarizer_config = SummarizerConfig::from_env().expect("Failed to load summarizer config");
    let prompts = PromptBook::from_chain(&Default::default(), "the camera wearer");
    let summarizer =
        Arc::new(OpenAiSummarizer::new(summarizer_config, prompts).expect("Failed to create summarizer"));

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(lifelog_storage::FsRecordStore::new(dir.path()));
    seed_leaves(store.as_ref(), "Monday", &captions(at(4, 9, 0, 0), 6, 15)).await;

    let driver = HierarchyDriver::new(config(&["Monday"]), store, summarizer).unwrap();
    let report = driver.run().await.expect("Run failed");

    assert!(report.is_complete());
    let week = std::fs::read_to_string(dir.path().join("week_summaries/week.txt")).unwrap();
    println!("Week summary: {}", week);
    assert!(!week.trim().is_empty());
}
