//! Outcome of reading a tab through the cache.

use serde::Serialize;

use super::Resource;
use crate::errors::FetchError;

/// Where the returned rows came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Source {
    Network,
    Cache,
}

/// Rows plus provenance. `error` is set only for a cache fallback.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    pub data: Resource,
    pub source: Source,
    pub error: Option<FetchError>,
}

impl FetchResult {
    pub fn network(data: Resource) -> Self {
        Self {
            data,
            source: Source::Network,
            error: None,
        }
    }

    pub fn cached(data: Resource, error: FetchError) -> Self {
        Self {
            data,
            source: Source::Cache,
            error: Some(error),
        }
    }

    /// True when the data is stale and the caller should show an advisory.
    pub fn is_stale(&self) -> bool {
        self.source == Source::Cache
    }
}
