//! In-memory record store.
//!
//! An ordered key-value backend with the same contract as the filesystem
//! store. Used by tests and by hosts that keep intermediate levels in memory.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use lifelog_models::{Record, RecordKey};

use crate::error::{StorageError, StorageResult};
use crate::store::{validate_name, RecordStore, StoreId, StoreListing};

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    stores: RwLock<BTreeMap<StoreId, BTreeMap<String, String>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a store (0 if absent).
    pub async fn len(&self, store: &StoreId) -> usize {
        self.stores
            .read()
            .await
            .get(store)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Raw text of one record, if present.
    pub async fn get(&self, store: &StoreId, key: &RecordKey) -> Option<String> {
        self.stores
            .read()
            .await
            .get(store)
            .and_then(|records| records.get(&key.as_name()).cloned())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn scan(&self, store: &StoreId) -> StorageResult<StoreListing> {
        let stores = self.stores.read().await;
        let records = stores
            .get(store)
            .ok_or_else(|| StorageError::not_found(store.to_string()))?;

        Ok(StoreListing {
            records: records
                .iter()
                .map(|(name, text)| Record::new(RecordKey::parse(name), text.clone()))
                .collect(),
            skipped: Vec::new(),
        })
    }

    async fn put(&self, store: &StoreId, key: &RecordKey, text: &str) -> StorageResult<()> {
        let name = key.as_name();
        validate_name(&name).map_err(StorageError::InvalidKey)?;

        self.stores
            .write()
            .await
            .entry(store.clone())
            .or_default()
            .insert(name, text.to_string());
        Ok(())
    }

    async fn exists(&self, store: &StoreId) -> StorageResult<bool> {
        Ok(self.stores.read().await.contains_key(store))
    }
}
