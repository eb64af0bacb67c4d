//! The record store contract.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use lifelog_models::{Record, RecordKey};

use crate::error::{StorageError, StorageResult};

/// Logical folder inside a store backend, e.g. `Monday/minute_summaries`.
///
/// Built from validated path segments so it can never escape the store root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct StoreId {
    segments: Vec<String>,
}

impl StoreId {
    pub fn new<I, S>(segments: I) -> StorageResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(StorageError::invalid_store_id("store id has no segments"));
        }
        for segment in &segments {
            validate_name(segment).map_err(StorageError::InvalidStoreId)?;
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// Check that a store segment or record name is usable as a single file name.
pub(crate) fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name is empty".to_string());
    }
    if name == "." || name == ".." {
        return Err(format!("'{}' is not a valid name", name));
    }
    if name.starts_with('.') {
        return Err(format!("'{}' is hidden", name));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(format!("'{}' contains a path separator", name));
    }
    Ok(())
}

/// An entry that was found in a store but is not a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub name: String,
    pub reason: String,
}

/// Result of scanning a store: records in key order plus skipped entries.
#[derive(Debug, Clone, Default)]
pub struct StoreListing {
    pub records: Vec<Record>,
    pub skipped: Vec<SkippedEntry>,
}

/// Ordered collection of records addressed by [`StoreId`].
///
/// Contract:
/// - `list` returns records sorted ascending by key name, is side-effect
///   free, and fails with [`StorageError::NotFound`] for an absent store
/// - `put` creates the store if needed and overwrites an existing key;
///   readers never observe a partially written record
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Scan a store, reporting entries that are not records.
    async fn scan(&self, store: &StoreId) -> StorageResult<StoreListing>;

    /// Write (or overwrite) one record.
    async fn put(&self, store: &StoreId, key: &RecordKey, text: &str) -> StorageResult<()>;

    /// Whether the store exists.
    async fn exists(&self, store: &StoreId) -> StorageResult<bool>;

    /// All records of a store, sorted by key name. Skipped entries are logged.
    async fn list(&self, store: &StoreId) -> StorageResult<Vec<Record>> {
        let listing = self.scan(store).await?;
        for entry in &listing.skipped {
            tracing::warn!(
                store = %store,
                entry = %entry.name,
                "Skipping store entry: {}",
                entry.reason
            );
        }
        Ok(listing.records)
    }

    /// Like `list`, but an absent store is an empty sequence.
    async fn list_or_empty(&self, store: &StoreId) -> StorageResult<Vec<Record>> {
        match self.list(store).await {
            Ok(records) => Ok(records),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
pub(crate) mod contract {
    //! Behaviour every `RecordStore` backend must share.

    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    pub async fn missing_store_is_not_found<S: RecordStore>(store: &S) {
        let id = StoreId::new(["Monday", "minute_summaries"]).unwrap();
        assert!(!store.exists(&id).await.unwrap());
        let err = store.list(&id).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.list_or_empty(&id).await.unwrap().is_empty());
    }

    pub async fn put_creates_and_overwrites<S: RecordStore>(store: &S) {
        let id = StoreId::new(["Monday", "hour_summaries"]).unwrap();
        let key = RecordKey::at(ts(10, 0, 0));

        store.put(&id, &key, "first").await.unwrap();
        assert!(store.exists(&id).await.unwrap());
        store.put(&id, &key, "second").await.unwrap();

        let records = store.list(&id).await.unwrap();
        assert_eq!(records, vec![Record::new(key, "second")]);
    }

    pub async fn list_is_ordered_by_key<S: RecordStore>(store: &S) {
        let id = StoreId::new(["day_summaries"]).unwrap();
        store.put(&id, &RecordKey::label("Tuesday"), "t").await.unwrap();
        store.put(&id, &RecordKey::at(ts(11, 0, 0)), "b").await.unwrap();
        store.put(&id, &RecordKey::label("Monday"), "m").await.unwrap();
        store.put(&id, &RecordKey::at(ts(9, 30, 0)), "a").await.unwrap();

        let names: Vec<String> = store
            .list(&id)
            .await
            .unwrap()
            .iter()
            .map(|r| r.key.as_name())
            .collect();
        assert_eq!(
            names,
            vec![
                "2024-03-04_09-30-00",
                "2024-03-04_11-00-00",
                "Monday",
                "Tuesday"
            ]
        );

        // Listing twice yields the same result.
        let again = store.list(&id).await.unwrap();
        assert_eq!(again.len(), 4);
    }

    pub async fn text_is_verbatim<S: RecordStore>(store: &S) {
        let id = StoreId::new(["Monday", "raw_summaries"]).unwrap();
        let text = "  line one\nline two\n\n";
        store.put(&id, &RecordKey::at(ts(8, 0, 0)), text).await.unwrap();
        let records = store.list(&id).await.unwrap();
        assert_eq!(records[0].text, text);
    }

    pub async fn rejects_unsafe_keys<S: RecordStore>(store: &S) {
        let id = StoreId::new(["x"]).unwrap();
        for bad in ["", "../escape", ".hidden", "a/b"] {
            let err = store.put(&id, &RecordKey::label(bad), "t").await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidKey(_)), "{bad}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_id_validation() {
        assert!(StoreId::new(["Monday", "raw_summaries"]).is_ok());
        assert!(StoreId::new(["Saturday 2"]).is_ok());
        assert!(StoreId::new(Vec::<String>::new()).is_err());
        assert!(StoreId::new(["..", "x"]).is_err());
        assert!(StoreId::new(["a/b"]).is_err());
        assert!(StoreId::new([".git"]).is_err());
    }

    #[test]
    fn test_store_id_display() {
        let id = StoreId::new(["Monday", "hour_summaries"]).unwrap();
        assert_eq!(id.to_string(), "Monday/hour_summaries");
    }
}
