//! Persisted table cache.
//!
//! Tables are stored under a logical dataset name (`items`, `sales`,
//! `big_df`, ...). The presence of an entry is the whole validity signal:
//! there is no TTL and no checksum check.
//!
//! - [`TableStore`]: key/value seam for backing stores
//! - [`CsvTableStore`]: one `<name>.csv` per key in the data directory
//! - [`MemoryTableStore`]: in-process store
//! - [`LocalCache`]: load-or-fetch on top of any store

mod cache;
mod csv;
mod memory;

pub use cache::LocalCache;
pub use csv::{read_table, write_table, CsvTableStore, TableMetadata, DATETIME_FIELD_FORMAT};
pub use memory::MemoryTableStore;

use std::path::PathBuf;

use async_trait::async_trait;
use polars::prelude::PolarsError;
use thiserror::Error;

use crate::models::{Table, TableError};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed table: {0}")]
    Table(#[from] TableError),

    #[error("Dataframe error: {0}")]
    Polars(#[from] PolarsError),
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,

    /// Write a `<name>.meta.json` sidecar next to each table
    pub write_metadata: bool,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            write_metadata: false,
        }
    }

    pub fn with_metadata(mut self, write_metadata: bool) -> Self {
        self.write_metadata = write_metadata;
        self
    }

    /// Path of the persisted table for a dataset name.
    pub fn table_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", name))
    }

    /// Path of the metadata sidecar for a dataset name.
    pub fn meta_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.meta.json", name))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("."))
    }
}

/// A keyed store of tables.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Short name for log lines.
    fn name(&self) -> &'static str;

    /// Whether an entry exists for `key`.
    async fn contains(&self, key: &str) -> Result<bool, StorageError>;

    /// Load the entry for `key`, or `None` if absent.
    async fn load(&self, key: &str) -> Result<Option<Table>, StorageError>;

    /// Persist `table` under `key`, overwriting any previous entry.
    async fn save(&self, key: &str, table: &Table) -> Result<(), StorageError>;

    /// Delete the entry for `key`. Returns whether anything was removed.
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;
}
