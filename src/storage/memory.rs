//! In-process table store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{StorageError, TableStore};
use crate::models::Table;

/// Table store that keeps entries in memory for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.is_empty()
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.tables.read().await.contains_key(key))
    }

    async fn load(&self, key: &str) -> Result<Option<Table>, StorageError> {
        Ok(self.tables.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, table: &Table) -> Result<(), StorageError> {
        self.tables
            .write()
            .await
            .insert(key.to_string(), table.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.tables.write().await.remove(key).is_some())
    }
}
