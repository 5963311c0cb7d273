//! Acquisition orchestrator.
//!
//! Ties the pipeline's sources to the cache:
//! 1. Retail tables (`items`, `stores`, `sales`) from the paginated API
//! 2. The merged retail table, built from the three above
//! 3. The energy table, downloaded as a single CSV
//!
//! Each step is served from the cache when an entry exists and is fetched
//! and persisted otherwise. Requests run one at a time.

mod merge;

pub use merge::{merge_store_data, MergeKeys};

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::config::{AppConfig, CacheConfig, ConfigError};
use crate::fetch::{FetchError, PageFetcher, PageSource};
use crate::models::{Table, TableError};
use crate::storage::{read_table, LocalCache, StorageError, TableStore};

/// Errors that can occur during acquisition.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Merge error: {0}")]
    Table(#[from] TableError),
}

/// Fetches, caches and merges the pipeline's datasets.
pub struct Acquirer<P, S> {
    fetcher: PageFetcher<P>,
    cache: LocalCache<S>,
    names: CacheConfig,
    energy_url: Url,
    keys: MergeKeys,
}

impl<P: PageSource, S: TableStore> Acquirer<P, S> {
    pub fn new(
        fetcher: PageFetcher<P>,
        cache: LocalCache<S>,
        names: CacheConfig,
        energy_url: Url,
    ) -> Self {
        Self {
            fetcher,
            cache,
            names,
            energy_url,
            keys: MergeKeys::default(),
        }
    }

    /// Build from application configuration.
    pub fn from_config(config: &AppConfig, source: P, store: S) -> Result<Self, ConfigError> {
        let fetcher = PageFetcher::new(
            source,
            config.retail_base_url()?,
            config.retail.api_path.clone(),
        );
        Ok(Self::new(
            fetcher,
            LocalCache::new(store),
            config.cache.clone(),
            config.energy_url()?,
        ))
    }

    pub fn fetcher(&self) -> &PageFetcher<P> {
        &self.fetcher
    }

    pub fn cache(&self) -> &LocalCache<S> {
        &self.cache
    }

    pub fn names(&self) -> &CacheConfig {
        &self.names
    }

    /// All pages of retail dataset `name`, from cache when present.
    ///
    /// A miss means `name` is about to be refetched, so every cached table
    /// built from it is dropped first.
    pub async fn get_df(&self, name: &str) -> Result<Table, AcquireError> {
        if !self.cache.store().contains(name).await? {
            self.drop_dependents(name).await?;
        }
        let fetcher = &self.fetcher;
        self.cache
            .load_or_fetch(name, move || async move { Ok(fetcher.fetch_table(name).await?) })
            .await
    }

    /// Up to `max_pages` pages of `name` by page number.
    ///
    /// Always hits the API; the result overwrites the cache entry for `name`
    /// and drops every cached table built from it.
    pub async fn get_df_paged(&self, name: &str, max_pages: usize) -> Result<Table, AcquireError> {
        let records = self.fetcher.fetch_paged(name, max_pages).await?;
        let table = Table::from_records(&records)?;
        self.drop_dependents(name).await?;
        self.cache.store().save(name, &table).await?;
        Ok(table)
    }

    /// The merged retail table.
    ///
    /// Ensures `items`, `stores` and `sales` are cached, then returns the
    /// cached merged table or builds, persists and returns it. Refetching any
    /// source drops the cached merge, so it is rebuilt here.
    pub async fn get_store_data(&self) -> Result<Table, AcquireError> {
        let items = self.get_df(&self.names.items).await?;
        let stores = self.get_df(&self.names.stores).await?;
        let sales = self.get_df(&self.names.sales).await?;

        let (items, stores, sales, keys) = (&items, &stores, &sales, &self.keys);
        self.cache
            .load_or_fetch(&self.names.merged, move || async move {
                Ok(merge_store_data(sales, stores, items, keys)?)
            })
            .await
    }

    async fn drop_dependents(&self, name: &str) -> Result<(), AcquireError> {
        for dependent in self.names.dependents(name) {
            if self.cache.invalidate(dependent).await? {
                info!("{} is being refetched, dropped cached {}", name, dependent);
            }
        }
        Ok(())
    }

    /// The German daily energy table, downloaded once.
    pub async fn opsd_germany_daily(&self) -> Result<Table, AcquireError> {
        let source = self.fetcher.source();
        let url = &self.energy_url;
        self.cache
            .load_or_fetch(&self.names.energy, move || async move {
                let body = source.get_text(url).await?;
                Ok(read_table(body.as_bytes(), false)?)
            })
            .await
    }

    /// Drop the cache entry for `name` and every entry built from it.
    ///
    /// Returns the names that were actually removed.
    pub async fn invalidate(&self, name: &str) -> Result<Vec<String>, AcquireError> {
        let mut removed = Vec::new();
        let targets = std::iter::once(name).chain(self.names.dependents(name));
        for target in targets {
            if self.cache.invalidate(target).await? {
                removed.push(target.to_string());
            }
        }
        info!("Invalidated {:?}", removed);
        Ok(removed)
    }
}
