//! Typed views over raw tab rows.
//!
//! Sheet columns arrive as `Field` or `field`; both spellings are folded here so
//! nothing downstream has to care.

use serde::Serialize;
use serde_json::Value;

use super::Record;

/// Read a column accepting `Name` or `name`. Numbers and booleans are stringified.
fn field(record: &Record, name: &str) -> Option<String> {
    let lower = lower_first(name);
    [name, lower.as_str()]
        .iter()
        .filter_map(|key| record.get(*key))
        .find_map(|value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
}

/// Like `field`, but empty strings count as missing.
fn non_empty(record: &Record, name: &str) -> Option<String> {
    field(record, name).filter(|s| !s.is_empty())
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A timetable row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub module: String,
    pub day: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

impl ScheduleEntry {
    pub fn from_record(record: &Record) -> Self {
        Self {
            module: field(record, "Module").unwrap_or_default(),
            day: field(record, "Day").unwrap_or_default(),
            start_time: field(record, "StartTime").unwrap_or_default(),
            end_time: field(record, "EndTime").unwrap_or_default(),
            room: non_empty(record, "Room"),
        }
    }

    /// `"<Module>-<StartTime>"`, the identity used for change detection.
    pub fn fingerprint(&self) -> String {
        format!("{}-{}", self.module, self.start_time)
    }
}

/// An announcement row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl Alert {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: non_empty(record, "Id"),
            title: non_empty(record, "Title"),
            message: non_empty(record, "Message"),
            priority: non_empty(record, "Priority"),
            expires_at: non_empty(record, "ExpiresAt"),
        }
    }

    /// High and medium priority alerts are shown prominently.
    pub fn is_important(&self) -> bool {
        matches!(
            self.priority.as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("high") | Some("medium")
        )
    }
}

/// A row of the shared todo tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedTodo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub priority: String,
    pub course: String,
    pub duration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<String>,
}

impl SharedTodo {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: non_empty(record, "Id"),
            title: non_empty(record, "Title").unwrap_or_else(|| "Untitled task".to_string()),
            priority: non_empty(record, "Priority").unwrap_or_else(|| "info".to_string()),
            course: non_empty(record, "Course").unwrap_or_else(|| "General".to_string()),
            duration: non_empty(record, "Duration").unwrap_or_else(|| "1h".to_string()),
            due_at: non_empty(record, "DueAt"),
        }
    }
}

pub fn schedule_entries(rows: &[Record]) -> Vec<ScheduleEntry> {
    rows.iter().map(ScheduleEntry::from_record).collect()
}

pub fn alerts(rows: &[Record]) -> Vec<Alert> {
    rows.iter().map(Alert::from_record).collect()
}

pub fn shared_todos(rows: &[Record]) -> Vec<SharedTodo> {
    rows.iter().map(SharedTodo::from_record).collect()
}
