//! Filesystem record store.
//!
//! One folder per store, one `<key>.txt` file per record. Files hold the
//! record text verbatim so every level stays inspectable by hand.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use lifelog_models::{Record, RecordKey};

use crate::error::{StorageError, StorageResult};
use crate::store::{validate_name, RecordStore, SkippedEntry, StoreId, StoreListing};

/// File extension of a record.
pub const RECORD_EXTENSION: &str = "txt";

/// Record store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    root: PathBuf,
}

impl FsRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory backing a store.
    pub fn store_path(&self, store: &StoreId) -> PathBuf {
        store
            .segments()
            .iter()
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    fn record_file_name(key: &RecordKey) -> StorageResult<String> {
        let name = key.as_name();
        validate_name(&name).map_err(StorageError::InvalidKey)?;
        Ok(format!("{}.{}", name, RECORD_EXTENSION))
    }

    /// Classify a directory entry as a record name or a skip reason.
    async fn entry_stem(entry: &fs::DirEntry) -> Result<String, String> {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| format!("cannot stat entry: {}", e))?;
        if !file_type.is_file() {
            return Err("not a regular file".to_string());
        }

        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| "file name is not valid UTF-8".to_string())?;
        if name.starts_with('.') {
            return Err("hidden or temporary file".to_string());
        }

        let path = Path::new(&name);
        match (path.file_stem(), path.extension()) {
            (Some(stem), Some(ext)) if ext == RECORD_EXTENSION => stem
                .to_str()
                .map(str::to_string)
                .ok_or_else(|| "file name is not valid UTF-8".to_string()),
            _ => Err(format!("not a .{} file", RECORD_EXTENSION)),
        }
    }
}

#[async_trait]
impl RecordStore for FsRecordStore {
    async fn scan(&self, store: &StoreId) -> StorageResult<StoreListing> {
        let dir = self.store_path(store);

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::not_found(store.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut named = Vec::new();
        let mut skipped = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            match Self::entry_stem(&entry).await {
                Ok(stem) => named.push((stem, entry.path())),
                Err(reason) => skipped.push(SkippedEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    reason,
                }),
            }
        }

        named.sort_by(|a, b| a.0.cmp(&b.0));

        let mut records = Vec::with_capacity(named.len());
        for (stem, path) in named {
            match fs::read_to_string(&path).await {
                Ok(text) => records.push(Record::new(RecordKey::parse(&stem), text)),
                Err(e) if e.kind() == ErrorKind::InvalidData => skipped.push(SkippedEntry {
                    name: format!("{}.{}", stem, RECORD_EXTENSION),
                    reason: "content is not valid UTF-8".to_string(),
                }),
                // Removed between read_dir and read.
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StorageError::read_failed(format!(
                        "{}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }

        debug!(
            store = %store,
            records = records.len(),
            skipped = skipped.len(),
            "Scanned store"
        );

        Ok(StoreListing { records, skipped })
    }

    async fn put(&self, store: &StoreId, key: &RecordKey, text: &str) -> StorageResult<()> {
        let file_name = Self::record_file_name(key)?;
        let dir = self.store_path(store);
        fs::create_dir_all(&dir).await?;

        let target = dir.join(&file_name);
        let contents = text.to_owned();

        // Temp file in the same directory, then an atomic rename over the target.
        // Temp names start with '.', so concurrent scans skip them.
        tokio::task::spawn_blocking(move || -> StorageResult<()> {
            let mut tmp = tempfile::Builder::new()
                .prefix(".tmp-")
                .tempfile_in(&dir)?;
            tmp.write_all(contents.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&target)
                .map_err(|e| StorageError::write_failed(format!("{}: {}", target.display(), e)))?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::write_failed(format!("write task failed: {}", e)))??;

        debug!(store = %store, key = %key, "Wrote record");
        Ok(())
    }

    async fn exists(&self, store: &StoreId) -> StorageResult<bool> {
        match fs::metadata(self.store_path(store)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
