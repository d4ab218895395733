use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};
use tokio::sync::Notify;

use super::*;
use crate::db::MemoryStore;
use crate::errors::FetchError;
use crate::sheets::fake::FakeSheetSource;
use crate::sheets::{SheetSource, SheetTab};

struct Harness {
    source: Arc<FakeSheetSource>,
    store: Arc<MemoryStore>,
    sink: Arc<MemorySink>,
    notifier: Notifier,
}

impl Harness {
    fn new() -> Self {
        let source = Arc::new(FakeSheetSource::new());
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(MemorySink::default());
        let cache = ResourceCache::new(source.clone(), store.clone());
        let notifier = Notifier::new(cache, store.clone(), sink.clone(), TimePolicy::Lenient);
        Self {
            source,
            store,
            sink,
            notifier,
        }
    }

    async fn fingerprint(&self, key: &str) -> Option<String> {
        self.store
            .get(key)
            .await
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }
}

/// 2026-10-19 is a Monday.
fn monday_at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 19)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn timetable() -> Value {
    json!([
        {"Module": "Algorithms", "Day": "Monday", "StartTime": "10:00", "EndTime": "11:30", "Room": "B12"},
        {"Module": "Networks", "Day": "Monday", "StartTime": "14:00", "EndTime": "15:30"},
        {"Module": "Databases", "Day": "Tuesday", "StartTime": "10:00", "EndTime": "11:30"}
    ])
}

#[tokio::test]
async fn test_unchanged_data_emits_nothing_on_second_tick() {
    let h = Harness::new();
    h.source.set_rows("SCHEDULE", timetable());
    h.source.set_rows("ALERTS", json!([{"Id": "A1", "Title": "Welcome"}]));

    let first = h.notifier.run_tick(monday_at(10, 15)).await.unwrap();
    assert_eq!(first.emitted.len(), 2);
    assert_eq!(first.outcome, TickOutcome::NewData);

    let second = h.notifier.run_tick(monday_at(10, 20)).await.unwrap();
    assert!(second.emitted.is_empty());
    assert_eq!(second.outcome, TickOutcome::NoData);
    assert_eq!(h.sink.delivered().len(), 2);
}

#[tokio::test]
async fn test_only_the_newest_alert_is_announced() {
    let h = Harness::new();
    h.source.set_rows("SCHEDULE", json!([]));
    h.source.set_rows(
        "ALERTS",
        json!([
            {"Id": "A1", "Title": "Room change", "Message": "B12 to C3"},
            {"Id": "A2", "Title": "Exam", "Message": "Friday 9am"}
        ]),
    );
    let first = h.notifier.run_tick(monday_at(8, 0)).await.unwrap();
    assert_eq!(first.emitted, vec![NotificationIntent::new("Exam", "Friday 9am")]);

    h.source.set_rows(
        "ALERTS",
        json!([
            {"Id": "A1", "Title": "Room change", "Message": "B12 to C3"},
            {"Id": "A2", "Title": "Exam", "Message": "Friday 9am"},
            {"Id": "A3", "Title": "Holiday", "Message": "No classes Monday"}
        ]),
    );
    let second = h.notifier.run_tick(monday_at(8, 5)).await.unwrap();

    assert_eq!(
        second.emitted,
        vec![NotificationIntent::new("Holiday", "No classes Monday")]
    );
    assert_eq!(h.fingerprint(keys::LAST_ALERT_ID).await.as_deref(), Some("A3"));
}

#[tokio::test]
async fn test_alert_ids_compare_as_strings() {
    let h = Harness::new();
    h.source.set_rows("SCHEDULE", json!([]));
    h.source
        .set_rows("ALERTS", json!([{"Id": "10", "Title": "ten"}, {"Id": "9", "Title": "nine"}]));

    let report = h.notifier.run_tick(monday_at(8, 0)).await.unwrap();

    // "9" > "10" lexicographically.
    assert_eq!(report.emitted[0].title, "nine");
}

#[tokio::test]
async fn test_alert_defaults_and_lowercase_id() {
    let h = Harness::new();
    h.source.set_rows("SCHEDULE", json!([]));
    h.source.set_rows("ALERTS", json!([{"id": "B7"}, {"Title": "no id"}]));

    let report = h.notifier.run_tick(monday_at(8, 0)).await.unwrap();

    assert_eq!(report.emitted, vec![NotificationIntent::new(DEFAULT_ALERT_TITLE, "")]);
    assert_eq!(h.fingerprint(keys::LAST_ALERT_ID).await.as_deref(), Some("B7"));
}

#[tokio::test]
async fn test_alerts_without_ids_are_ignored() {
    let h = Harness::new();
    h.source.set_rows("SCHEDULE", json!([]));
    h.source.set_rows("ALERTS", json!([{"Title": "anonymous"}, {"Id": ""}]));

    let report = h.notifier.run_tick(monday_at(8, 0)).await.unwrap();

    assert!(report.emitted.is_empty());
    assert_eq!(h.fingerprint(keys::LAST_ALERT_ID).await, None);
}

#[tokio::test]
async fn test_entering_a_session_notifies_once() {
    let h = Harness::new();
    h.source.set_rows("SCHEDULE", timetable());
    h.source.set_rows("ALERTS", json!([]));

    let before = h.notifier.run_tick(monday_at(9, 30)).await.unwrap();
    assert!(before.emitted.is_empty());
    assert_eq!(h.fingerprint(keys::LAST_SESSION).await.as_deref(), Some(NO_SESSION));

    let during = h.notifier.run_tick(monday_at(10, 0)).await.unwrap();
    assert_eq!(during.emitted.len(), 1);
    assert_eq!(during.emitted[0].title, SESSION_TITLE);
    assert!(during.emitted[0].body.contains("Algorithms"));
    assert_eq!(during.emitted[0].body, "Algorithms · 10:00 - 11:30");
    assert_eq!(
        h.fingerprint(keys::LAST_SESSION).await.as_deref(),
        Some("Algorithms-10:00")
    );
}

#[tokio::test]
async fn test_leaving_a_session_updates_fingerprint_silently() {
    let h = Harness::new();
    h.source.set_rows("SCHEDULE", timetable());
    h.source.set_rows("ALERTS", json!([]));

    h.notifier.run_tick(monday_at(10, 0)).await.unwrap();
    let after = h.notifier.run_tick(monday_at(12, 0)).await.unwrap();

    assert!(after.emitted.is_empty());
    assert_eq!(h.fingerprint(keys::LAST_SESSION).await.as_deref(), Some(NO_SESSION));
}

#[tokio::test]
async fn test_back_to_back_sessions_notify_each() {
    let h = Harness::new();
    h.source.set_rows(
        "SCHEDULE",
        json!([
            {"Module": "Algorithms", "Day": "Mon", "StartTime": "10:00", "EndTime": "11:00"},
            {"Module": "Networks", "Day": "Mon", "StartTime": "11:01", "EndTime": "12:00"}
        ]),
    );
    h.source.set_rows("ALERTS", json!([]));

    h.notifier.run_tick(monday_at(10, 30)).await.unwrap();
    let next = h.notifier.run_tick(monday_at(11, 1)).await.unwrap();

    assert_eq!(next.emitted.len(), 1);
    assert!(next.emitted[0].body.starts_with("Networks"));
}

#[tokio::test]
async fn test_schedule_processed_when_alerts_hard_fail() {
    let h = Harness::new();
    h.source.set_rows("SCHEDULE", timetable());
    h.source.set_error("ALERTS", FetchError::Transport("offline".into()));

    let report = h.notifier.run_tick(monday_at(14, 10)).await.unwrap();

    assert_eq!(report.emitted.len(), 1);
    assert!(report.emitted[0].body.contains("Networks"));
    assert_eq!(report.schedule_source, Some(Source::Network));
    assert_eq!(report.alerts_source, None);
    assert_eq!(h.fingerprint(keys::LAST_ALERT_ID).await, None);
}

#[tokio::test]
async fn test_alerts_processed_when_schedule_hard_fails() {
    let h = Harness::new();
    h.source.set_error("SCHEDULE", FetchError::Status(500));
    h.source.set_rows("ALERTS", json!([{"Id": "A1", "Title": "Exam"}]));

    let report = h.notifier.run_tick(monday_at(10, 0)).await.unwrap();

    assert_eq!(report.emitted, vec![NotificationIntent::new("Exam", "")]);
    assert_eq!(h.fingerprint(keys::LAST_SESSION).await, None);
}

#[tokio::test]
async fn test_both_resources_unavailable_fails_without_writes() {
    let h = Harness::new();
    h.source.set_error("SCHEDULE", FetchError::Status(500));
    h.source.set_error("ALERTS", FetchError::Upstream("quota".into()));

    let report = h.notifier.run_tick(monday_at(10, 0)).await.unwrap();

    assert_eq!(report.outcome, TickOutcome::Failed);
    assert!(report.emitted.is_empty());
    assert_eq!(h.fingerprint(keys::LAST_SESSION).await, None);
    assert_eq!(h.fingerprint(keys::LAST_ALERT_ID).await, None);
}

#[tokio::test]
async fn test_cached_data_does_not_renotify() {
    let h = Harness::new();
    h.source.set_rows("SCHEDULE", timetable());
    h.source.set_rows("ALERTS", json!([{"Id": "A1", "Title": "Exam"}]));
    h.notifier.run_tick(monday_at(10, 0)).await.unwrap();

    h.source.set_error("SCHEDULE", FetchError::Status(503));
    h.source.set_error("ALERTS", FetchError::Status(503));
    let report = h.notifier.run_tick(monday_at(10, 5)).await.unwrap();

    assert!(report.emitted.is_empty());
    assert_eq!(report.schedule_source, Some(Source::Cache));
    assert_eq!(report.alerts_source, Some(Source::Cache));
    assert_eq!(report.outcome, TickOutcome::NoData);
}

#[tokio::test]
async fn test_corrupt_fingerprint_is_replaced() {
    let h = Harness::new();
    h.store.set(keys::LAST_ALERT_ID, "not json").await.unwrap();
    h.source.set_rows("SCHEDULE", json!([]));
    h.source.set_rows("ALERTS", json!([{"Id": "A1"}]));

    let report = h.notifier.run_tick(monday_at(8, 0)).await.unwrap();

    assert_eq!(report.emitted.len(), 1);
    assert_eq!(h.fingerprint(keys::LAST_ALERT_ID).await.as_deref(), Some("A1"));
}

struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    async fn deliver(&self, _intent: &NotificationIntent) -> Result<(), AppError> {
        Err(AppError::Internal("display unavailable".into()))
    }
}

#[tokio::test]
async fn test_sink_failure_is_not_retried() {
    let source = Arc::new(FakeSheetSource::new());
    let store = Arc::new(MemoryStore::new());
    let cache = ResourceCache::new(source.clone(), store.clone());
    let notifier = Notifier::new(cache, store.clone(), Arc::new(FailingSink), TimePolicy::Lenient);
    source.set_rows("SCHEDULE", json!([]));
    source.set_rows("ALERTS", json!([{"Id": "A1"}]));

    let first = notifier.run_tick(monday_at(8, 0)).await.unwrap();
    assert!(first.emitted.is_empty());

    let second = notifier.run_tick(monday_at(8, 5)).await.unwrap();
    assert!(second.emitted.is_empty());
    assert_eq!(second.outcome, TickOutcome::NoData);
}

/// Store whose writes to one key always fail.
struct ReadOnlyKeyStore {
    inner: MemoryStore,
    locked: &'static str,
}

#[async_trait]
impl KeyValueStore for ReadOnlyKeyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        if key == self.locked {
            return Err(AppError::Database("disk full".into()));
        }
        self.inner.set(key, value).await
    }
}

#[tokio::test]
async fn test_storage_failure_suppresses_only_that_resource() {
    let source = Arc::new(FakeSheetSource::new());
    let store = Arc::new(ReadOnlyKeyStore {
        inner: MemoryStore::new(),
        locked: keys::LAST_SESSION,
    });
    let sink = Arc::new(MemorySink::default());
    let cache = ResourceCache::new(source.clone(), store.clone());
    let notifier = Notifier::new(cache, store.clone(), sink.clone(), TimePolicy::Lenient);
    source.set_rows("SCHEDULE", timetable());
    source.set_rows("ALERTS", json!([{"Id": "A1", "Title": "Exam"}]));

    let report = notifier.run_tick(monday_at(10, 0)).await.unwrap();

    assert_eq!(report.emitted, vec![NotificationIntent::new("Exam", "")]);
    assert_eq!(store.get(keys::LAST_SESSION).await.unwrap(), None);

    let retry = notifier.run_tick(monday_at(10, 1)).await.unwrap();
    assert_eq!(retry.outcome, TickOutcome::Failed);
    assert!(retry.emitted.is_empty());
}

/// Source that blocks every fetch until released.
struct GatedSource {
    inner: FakeSheetSource,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl SheetSource for GatedSource {
    async fn fetch_tab(&self, tab: &str) -> Result<SheetTab, FetchError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.fetch_tab(tab).await
    }
}

#[tokio::test]
async fn test_overlapping_tick_is_rejected() {
    let source = Arc::new(GatedSource {
        inner: FakeSheetSource::new(),
        entered: Notify::new(),
        release: Notify::new(),
    });
    source.inner.set_rows("SCHEDULE", json!([]));
    source.inner.set_rows("ALERTS", json!([]));
    let store = Arc::new(MemoryStore::new());
    let cache = ResourceCache::new(source.clone(), store.clone());
    let notifier = Arc::new(Notifier::new(
        cache,
        store,
        Arc::new(MemorySink::default()),
        TimePolicy::Lenient,
    ));

    let running = {
        let notifier = notifier.clone();
        tokio::spawn(async move { notifier.run_tick(monday_at(8, 0)).await })
    };
    source.entered.notified().await;

    let overlapping = notifier.run_tick(monday_at(8, 0)).await;
    assert!(matches!(overlapping, Err(AppError::Conflict(_))));

    source.release.notify_waiters();
    let first = running.await.unwrap().unwrap();
    assert_eq!(first.outcome, TickOutcome::NoData);
    assert_eq!(source.inner.calls(), 2);
}
