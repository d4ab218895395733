//! Timetable resolution: which classes are today and which one is running now.
//!
//! Everything here is pure and cheap enough to run on every request.

mod views;

pub use views::*;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::models::ScheduleEntry;

/// How to treat a start or end time that is not `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TimePolicy {
    /// Malformed times read as midnight (minute 0).
    #[default]
    Lenient,
    /// Entries with a malformed time are never active.
    Strict,
}

impl TimePolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            TimePolicy::Strict
        } else {
            TimePolicy::Lenient
        }
    }

    fn minutes(self, time: &str) -> Option<u32> {
        match (parse_to_minutes(time), self) {
            (Some(minutes), _) => Some(minutes),
            (None, TimePolicy::Lenient) => Some(0),
            (None, TimePolicy::Strict) => None,
        }
    }
}

/// `"HH:MM"` (seconds ignored) to `hours * 60 + minutes`.
///
/// Fields are not range-checked, so `"24:00"` is 1440 and closes a class that
/// runs until midnight.
pub fn parse_to_minutes(time: &str) -> Option<u32> {
    let mut parts = time.trim().split(':');
    let hours: u32 = parts.next()?.trim().parse().ok()?;
    let minutes: u32 = parts.next()?.trim().parse().ok()?;
    hours.checked_mul(60)?.checked_add(minutes)
}

/// First three letters, lowercased: `"Monday"` and `" MON"` both become `"mon"`.
pub fn normalize_day(day: &str) -> String {
    day.trim().chars().take(3).collect::<String>().to_lowercase()
}

/// Entries held on `now`'s weekday, in input order.
pub fn today_schedule(schedule: &[ScheduleEntry], now: NaiveDateTime) -> Vec<ScheduleEntry> {
    let today = normalize_day(&now.weekday().to_string());
    schedule
        .iter()
        .filter(|entry| normalize_day(&entry.day) == today)
        .cloned()
        .collect()
}

/// First entry whose `[start, end]` window contains `now`'s minute of day.
pub fn current_session(
    today: &[ScheduleEntry],
    now: NaiveDateTime,
    policy: TimePolicy,
) -> Option<&ScheduleEntry> {
    let current = now.hour() * 60 + now.minute();
    today.iter().find(|entry| {
        match (policy.minutes(&entry.start_time), policy.minutes(&entry.end_time)) {
            (Some(start), Some(end)) => start <= current && current <= end,
            _ => false,
        }
    })
}
