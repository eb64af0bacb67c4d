//! Record stores for the lifelog summary hierarchy.
//!
//! This crate provides:
//! - The `RecordStore` contract (ordered, overwrite-on-put, atomic writes)
//! - A filesystem backend with one plain-text file per record
//! - An in-memory backend with the same contract
//! - The (subject, level) to store-id layout

pub mod error;
pub mod fs;
pub mod layout;
pub mod memory;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use fs::FsRecordStore;
pub use layout::{StoreLayout, DEFAULT_LEAF_STORE};
pub use memory::MemoryRecordStore;
pub use store::{RecordStore, SkippedEntry, StoreId, StoreListing};
