//! Network-first resource cache.
//!
//! A read returns the freshest rows available: the network result when the fetch
//! succeeds (and the cache entry is overwritten with it), otherwise the last cached
//! copy together with the failure as an advisory. Only when both are missing does
//! the failure reach the caller. There are no retries here; every background tick
//! is its own retry.

use std::sync::Arc;

use crate::db::KeyValueStore;
use crate::errors::FetchError;
use crate::models::{FetchResult, Resource, ResourceKind};
use crate::sheets::SheetSource;

/// Fetch-or-fallback over a sheet source and a key-value store.
#[derive(Clone)]
pub struct ResourceCache {
    source: Arc<dyn SheetSource>,
    store: Arc<dyn KeyValueStore>,
}

impl ResourceCache {
    pub fn new(source: Arc<dyn SheetSource>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { source, store }
    }

    pub async fn fetch_resource(&self, kind: ResourceKind) -> Result<FetchResult, FetchError> {
        self.fetch_tab(kind.tab_name(), kind.storage_key()).await
    }

    pub async fn fetch_schedule(&self) -> Result<FetchResult, FetchError> {
        self.fetch_resource(ResourceKind::Schedule).await
    }

    pub async fn fetch_alerts(&self) -> Result<FetchResult, FetchError> {
        self.fetch_resource(ResourceKind::Alerts).await
    }

    pub async fn fetch_shared_todos(&self) -> Result<FetchResult, FetchError> {
        self.fetch_resource(ResourceKind::SharedTodo).await
    }

    /// Read `tab` from the network, falling back to the copy under `storage_key`.
    pub async fn fetch_tab(
        &self,
        tab: &str,
        storage_key: &str,
    ) -> Result<FetchResult, FetchError> {
        match self.source.fetch_tab(tab).await {
            Ok(sheet) => {
                self.persist(tab, storage_key, &sheet.raw).await;
                Ok(FetchResult::network(sheet.rows))
            }
            Err(error) => {
                tracing::warn!("Failed to fetch {}, loading from cache: {}", tab, error);
                match self.load_cached(storage_key).await {
                    Some(data) => Ok(FetchResult::cached(data, error)),
                    None => Err(error),
                }
            }
        }
    }

    /// Overwrite the cache entry with the body as received. A failed write still
    /// lets the fresh rows through.
    async fn persist(&self, tab: &str, storage_key: &str, raw: &str) {
        if let Err(e) = self.store.set(storage_key, raw).await {
            tracing::warn!("Failed to cache {}: {}", tab, e);
        }
    }

    /// Last cached rows. Unreadable or corrupt entries count as missing.
    async fn load_cached(&self, storage_key: &str) -> Option<Resource> {
        let raw = match self.store.get(storage_key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Failed to read cache entry {}: {}", storage_key, e);
                return None;
            }
        };

        match serde_json::from_str::<Resource>(&raw) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!("Discarding corrupt cache entry {}: {}", storage_key, e);
                None
            }
        }
    }
}
