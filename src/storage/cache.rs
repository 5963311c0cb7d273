//! Load-or-fetch cache over a [`TableStore`].

use std::future::Future;

use tracing::info;

use super::{StorageError, TableStore};
use crate::models::Table;

/// Serves tables from a store, computing and persisting them on a miss.
///
/// There is no locking: two processes missing on the same key will both
/// fetch and the last writer wins.
pub struct LocalCache<S> {
    store: S,
}

impl<S: TableStore> LocalCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Return the stored table for `name`, or run `fetch`, persist its
    /// result under `name` and return it.
    pub async fn load_or_fetch<F, Fut, E>(&self, name: &str, fetch: F) -> Result<Table, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Table, E>>,
        E: From<StorageError>,
    {
        if let Some(table) = self.store.load(name).await? {
            info!(
                "Serving {} from {} cache ({} rows)",
                name,
                self.store.name(),
                table.len()
            );
            return Ok(table);
        }

        info!("Cache miss for {}, fetching", name);
        let table = fetch().await?;
        self.store.save(name, &table).await?;
        Ok(table)
    }

    /// Drop the entry for `name`. Returns whether one existed.
    pub async fn invalidate(&self, name: &str) -> Result<bool, StorageError> {
        self.store.remove(name).await
    }
}
