//! Named tabs of the shared sheet and their schema-less rows.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::db::keys;
use crate::errors::AppError;

/// One row of a tab, keyed by column name.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Ordered rows of a tab. Always a list, possibly empty.
pub type Resource = Vec<Record>;

/// The tabs the sync core knows how to fetch and cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Schedule,
    Alerts,
    SharedTodo,
}

impl ResourceKind {
    #[cfg(test)]
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Schedule,
        ResourceKind::Alerts,
        ResourceKind::SharedTodo,
    ];

    /// Tab name in the remote sheet.
    pub fn tab_name(self) -> &'static str {
        match self {
            ResourceKind::Schedule => "SCHEDULE",
            ResourceKind::Alerts => "ALERTS",
            ResourceKind::SharedTodo => "TODO",
        }
    }

    /// Key the last successful payload is cached under.
    pub fn storage_key(self) -> &'static str {
        match self {
            ResourceKind::Schedule => keys::SCHEDULE,
            ResourceKind::Alerts => keys::ALERTS,
            ResourceKind::SharedTodo => keys::SHARED_TODO,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tab_name())
    }
}

impl FromStr for ResourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "schedule" => Ok(ResourceKind::Schedule),
            "alerts" => Ok(ResourceKind::Alerts),
            "todo" | "shared_todo" | "sharedtodo" => Ok(ResourceKind::SharedTodo),
            other => Err(AppError::NotFound(format!("Unknown resource {}", other))),
        }
    }
}
