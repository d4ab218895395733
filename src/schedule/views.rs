//! Derived views over cached tabs: the weekly grid, alert groups and todo deadlines.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::normalize_day;
use crate::models::{Alert, ScheduleEntry};

pub const WEEK_DAYS: [&str; 5] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];

#[derive(Debug, Clone, Serialize)]
pub struct DaySchedule {
    pub day: &'static str,
    pub sessions: Vec<ScheduleEntry>,
}

/// Monday to Friday, each day's sessions sorted by start time.
pub fn week_schedule(schedule: &[ScheduleEntry]) -> Vec<DaySchedule> {
    WEEK_DAYS
        .iter()
        .map(|day| {
            let key = normalize_day(day);
            let mut sessions: Vec<ScheduleEntry> = schedule
                .iter()
                .filter(|entry| normalize_day(&entry.day) == key)
                .cloned()
                .collect();
            sessions.sort_by(|a, b| a.start_time.cmp(&b.start_time));
            DaySchedule { day: *day, sessions }
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertGroups {
    pub important: Vec<Alert>,
    pub general: Vec<Alert>,
}

pub fn partition_alerts(alerts: Vec<Alert>) -> AlertGroups {
    let (important, general) = alerts.into_iter().partition(Alert::is_important);
    AlertGroups { important, general }
}

fn parse_due(due_at: &str) -> Option<NaiveDateTime> {
    let due_at = due_at.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(due_at) {
        return Some(parsed.with_timezone(&Local).naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(due_at, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(due_at, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// `"Due"`, `"<n>h left"` under a day, otherwise `"<n>d left"` rounded up.
pub fn time_left_label(due_at: &str, now: NaiveDateTime) -> Option<String> {
    let due = parse_due(due_at)?;
    let remaining = due - now;
    if remaining.num_milliseconds() <= 0 {
        return Some("Due".to_string());
    }

    let hours = remaining.num_hours();
    if hours < 24 {
        Some(format!("{}h left", hours))
    } else {
        Some(format!("{}d left", (hours + 23) / 24))
    }
}
