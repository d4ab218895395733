//! Remote sheet reader.
//!
//! Each tab is served as a JSON list of row objects. The upstream reports its own
//! failures inside a 200 response as `{"error": "..."}`, so the body shape is
//! checked as well as the status.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::errors::{AppError, FetchError};
use crate::models::Resource;

/// A tab as received: the parsed rows and the body text they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTab {
    pub rows: Resource,
    pub raw: String,
}

impl SheetTab {
    /// Parse a body that arrived as text.
    pub fn from_body(raw: String) -> Result<Self, FetchError> {
        let body: Value =
            serde_json::from_str(&raw).map_err(|e| FetchError::Payload(e.to_string()))?;
        let rows = parse_payload(body)?;
        Ok(Self { rows, raw })
    }
}

/// Source of tab rows.
#[async_trait]
pub trait SheetSource: Send + Sync {
    async fn fetch_tab(&self, tab: &str) -> Result<SheetTab, FetchError>;
}

/// Reads tabs over HTTP from `{base_url}/{sheet_id}/{tab}`.
#[derive(Debug, Clone)]
pub struct HttpSheetSource {
    client: Client,
    base_url: String,
    sheet_id: String,
}

impl HttpSheetSource {
    pub fn new(base_url: &str, sheet_id: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            sheet_id: sheet_id.to_string(),
        })
    }

    pub fn tab_url(&self, tab: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.sheet_id, tab)
    }
}

#[async_trait]
impl SheetSource for HttpSheetSource {
    async fn fetch_tab(&self, tab: &str) -> Result<SheetTab, FetchError> {
        let url = self.tab_url(tab);
        tracing::debug!("Fetching from: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let raw = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        SheetTab::from_body(raw)
    }
}

/// Interpret a decoded body as rows or as an upstream error.
pub fn parse_payload(body: Value) -> Result<Resource, FetchError> {
    match body {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(row) => Ok(row),
                other => Err(FetchError::Payload(format!(
                    "row {} is not an object: {}",
                    index, other
                ))),
            })
            .collect(),
        Value::Object(map) => match map.get("error") {
            Some(Value::String(message)) => Err(FetchError::Upstream(message.clone())),
            Some(other) => Err(FetchError::Upstream(other.to_string())),
            None => Err(FetchError::Payload("expected a list of rows".to_string())),
        },
        other => Err(FetchError::Payload(format!(
            "expected a list of rows, got {}",
            other
        ))),
    }
}
