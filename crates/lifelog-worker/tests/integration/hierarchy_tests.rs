//! End-to-end hierarchy runs over in-memory and filesystem stores.

use std::sync::Arc;

use tokio_test::assert_ok;

use lifelog_models::{Level, RecordKey};
use lifelog_storage::{FsRecordStore, MemoryRecordStore, RecordStore, StoreId};
use lifelog_worker::{
    BucketOutcome, FoldOutcome, HierarchyDriver, LevelOutcome, TerminalOutcome, TrainingExporter,
};

use super::common::{at, captions, config, seed_leaves, CountingSummarizer};

fn store_id(segments: &[&str]) -> StoreId {
    StoreId::new(segments.iter().copied()).unwrap()
}

/// Two hours of captions one second apart.
#[tokio::test]
async fn test_two_hour_day_bucket_counts() {
    let store = Arc::new(MemoryRecordStore::new());
    let summarizer = Arc::new(CountingSummarizer::new());
    seed_leaves(store.as_ref(), "Monday", &captions(at(4, 10, 0, 0), 7200, 1)).await;

    let mut config = config(&["Monday"]);
    config.max_parallel_summaries = 8;
    let driver = HierarchyDriver::new(config, store.clone(), summarizer.clone()).unwrap();
    let report = assert_ok!(driver.run().await);

    assert!(report.is_complete());
    assert_eq!(store.len(&store_id(&["Monday", "minute_summaries"])).await, 120);
    assert_eq!(store.len(&store_id(&["Monday", "ten_minute_summaries"])).await, 12);
    assert_eq!(store.len(&store_id(&["Monday", "hour_summaries"])).await, 2);
    assert_eq!(store.len(&store_id(&["Monday", "day_summaries"])).await, 1);

    assert_eq!(summarizer.calls(Level::Minute), 120);
    assert_eq!(summarizer.calls(Level::TenMinute), 12);
    assert_eq!(summarizer.calls(Level::Hour), 2);
    // The day bucket holds both hour records.
    assert_eq!(summarizer.calls(Level::Day), 1);
    // One subject: the fold copies, the terminal passes through.
    assert_eq!(summarizer.calls(Level::Week), 0);

    let hours = store
        .list(&store_id(&["Monday", "hour_summaries"]))
        .await
        .unwrap();
    assert_eq!(hours[0].key, RecordKey::at(at(4, 10, 0, 0)));
    assert_eq!(hours[1].key, RecordKey::at(at(4, 11, 0, 0)));
    assert_eq!(hours[0].text, "hour summary of 6 entries from 2024-03-04_10-00-00");

    let day = store
        .get(&store_id(&["Monday", "day_summaries"]), &RecordKey::at(at(4, 10, 0, 0)))
        .await
        .unwrap();
    let folded = store
        .get(&store_id(&["day_summaries"]), &RecordKey::label("Monday"))
        .await
        .unwrap();
    let week = store
        .get(&store_id(&["week_summaries"]), &RecordKey::label("week"))
        .await
        .unwrap();
    assert_eq!(folded, day);
    assert_eq!(week, day);
}

#[tokio::test]
async fn test_week_over_several_subjects_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsRecordStore::new(dir.path()));
    let summarizer = Arc::new(CountingSummarizer::new());

    seed_leaves(store.as_ref(), "Sunday", &captions(at(3, 9, 0, 0), 150, 2)).await;
    seed_leaves(store.as_ref(), "Monday", &captions(at(4, 18, 30, 0), 40, 20)).await;
    seed_leaves(store.as_ref(), "Tuesday", &captions(at(5, 7, 0, 0), 1, 1)).await;

    // Files that are not records are ignored.
    std::fs::write(dir.path().join("Sunday/raw_summaries/.DS_Store"), b"junk").unwrap();
    std::fs::write(dir.path().join("Sunday/raw_summaries/notes.md"), b"junk").unwrap();

    let config = config(&["Sunday", "Monday", "Tuesday"]);
    let driver = HierarchyDriver::new(config.clone(), store.clone(), summarizer.clone()).unwrap();
    let report = assert_ok!(driver.run().await);
    assert!(report.is_complete());

    assert!(dir.path().join("Sunday/minute_summaries/2024-03-03_09-00-00.txt").is_file());
    assert!(dir.path().join("Monday/hour_summaries/2024-03-04_18-30-00.txt").is_file());
    assert!(dir.path().join("day_summaries/Sunday.txt").is_file());
    assert!(dir.path().join("day_summaries/Tuesday.txt").is_file());

    // Tuesday's single caption survives every level verbatim.
    let tuesday = std::fs::read_to_string(dir.path().join("day_summaries/Tuesday.txt")).unwrap();
    assert_eq!(tuesday, "frame 0 caption");

    assert!(report
        .fold
        .entries
        .iter()
        .all(|entry| matches!(entry.outcome, FoldOutcome::Copied)));
    assert!(matches!(
        report.terminal,
        TerminalOutcome::Written {
            outcome: BucketOutcome::Summarized,
            ..
        }
    ));
    assert_eq!(summarizer.calls(Level::Week), 1);

    let week = std::fs::read_to_string(dir.path().join("week_summaries/week.txt")).unwrap();
    assert_eq!(week, "week summary of 3 entries from Sunday");

    // Export what the run produced.
    let mut export_config = config;
    export_config.training_levels = vec![Level::Hour, Level::Day, Level::Week];
    let exporter = TrainingExporter::new(&export_config, store.clone());
    let path = dir.path().join("training.jsonl");
    let written = assert_ok!(exporter.write_jsonl(&path).await);

    let hours: usize = ["Sunday", "Monday", "Tuesday"]
        .iter()
        .map(|subject| {
            std::fs::read_dir(dir.path().join(subject).join("hour_summaries"))
                .unwrap()
                .count()
        })
        .sum();
    assert_eq!(written, hours + 3 + 1);
}

#[tokio::test]
async fn test_rerun_overwrites_with_identical_output() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsRecordStore::new(dir.path()));
    let summarizer = Arc::new(CountingSummarizer::new());
    seed_leaves(store.as_ref(), "Monday", &captions(at(4, 8, 0, 0), 300, 3)).await;

    let driver = HierarchyDriver::new(config(&["Monday"]), store.clone(), summarizer.clone()).unwrap();
    assert_ok!(driver.run().await);
    let minutes = store_id(&["Monday", "minute_summaries"]);
    let first = store.list(&minutes).await.unwrap();
    let first_week = store.list(&store_id(&["week_summaries"])).await.unwrap();
    let calls = summarizer.total_calls();

    assert_ok!(driver.run().await);
    assert_eq!(store.list(&minutes).await.unwrap(), first);
    assert_eq!(store.list(&store_id(&["week_summaries"])).await.unwrap(), first_week);
    // Without gap filling every bucket is produced again.
    assert_eq!(summarizer.total_calls(), calls * 2);
}

#[tokio::test]
async fn test_dropping_a_level_rewires_the_chain() {
    let store = Arc::new(MemoryRecordStore::new());
    let summarizer = Arc::new(CountingSummarizer::new());
    seed_leaves(store.as_ref(), "Monday", &captions(at(4, 10, 0, 0), 600, 6)).await;

    let mut config = config(&["Monday"]);
    config.chain.levels.retain(|spec| spec.level != Level::TenMinute);
    let driver = HierarchyDriver::new(config, store.clone(), summarizer.clone()).unwrap();
    let report = assert_ok!(driver.run().await);

    assert!(report.is_complete());
    let monday = report.subject(&"Monday".into()).unwrap();
    assert!(monday.outcome(Level::TenMinute).is_none());
    assert!(matches!(monday.outcome(Level::Hour), Some(LevelOutcome::Completed(_))));
    assert_eq!(summarizer.calls(Level::TenMinute), 0);
    // Hour reads minute records directly: 60 minutes in one hour bucket.
    assert_eq!(summarizer.calls(Level::Hour), 1);
    assert_eq!(store.len(&store_id(&["Monday", "ten_minute_summaries"])).await, 0);
}
