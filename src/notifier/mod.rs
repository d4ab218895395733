//! Change-detection notifier.
//!
//! Each tick pulls the schedule and the alerts through the cache, compares what it
//! sees with the fingerprints persisted by the previous tick and hands at most one
//! notification per resource to the sink. Fingerprints are written before the
//! notification goes out: a crash in between loses a notification but never
//! repeats one.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::cache::ResourceCache;
use crate::db::{keys, KeyValueStore};
use crate::errors::AppError;
use crate::models::{alerts, schedule_entries, NotificationIntent, Record, ScheduleEntry, Source};
use crate::scheduler::TaskHandler;
use crate::schedule::{current_session, today_schedule, TimePolicy};

pub const SESSION_TITLE: &str = "Current class";
pub const DEFAULT_ALERT_TITLE: &str = "New alert";
/// Session fingerprint when no class is running.
pub const NO_SESSION: &str = "none";

/// Displays notifications to the user.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, intent: &NotificationIntent) -> Result<(), AppError>;
}

/// Result signal handed back to the background host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TickOutcome {
    NewData,
    NoData,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub emitted: Vec<NotificationIntent>,
    pub schedule_source: Option<Source>,
    pub alerts_source: Option<Source>,
}

pub struct Notifier {
    cache: ResourceCache,
    store: Arc<dyn KeyValueStore>,
    sink: Arc<dyn NotificationSink>,
    policy: TimePolicy,
    running: Mutex<()>,
}

impl Notifier {
    pub fn new(
        cache: ResourceCache,
        store: Arc<dyn KeyValueStore>,
        sink: Arc<dyn NotificationSink>,
        policy: TimePolicy,
    ) -> Self {
        Self {
            cache,
            store,
            sink,
            policy,
            running: Mutex::new(()),
        }
    }

    /// Run one detection pass as of `now` (local wall clock).
    ///
    /// Fails only when another tick is still running. A resource that cannot be
    /// read at all is skipped for this tick without affecting the other one.
    pub async fn run_tick(&self, now: NaiveDateTime) -> Result<TickReport, AppError> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| AppError::Conflict("A notifier tick is already running".to_string()))?;

        let (schedule, alerts) =
            tokio::join!(self.cache.fetch_schedule(), self.cache.fetch_alerts());

        let mut emitted = Vec::new();
        let mut processed = 0;
        let mut failed = false;
        let mut schedule_source = None;
        let mut alerts_source = None;

        match schedule {
            Ok(result) => {
                processed += 1;
                schedule_source = Some(result.source);
                match self.detect_session_change(&result.data, now).await {
                    Ok(intent) => emitted.extend(intent),
                    Err(e) => {
                        tracing::warn!("Session change detection failed: {}", e);
                        failed = true;
                    }
                }
            }
            Err(e) => tracing::warn!("Schedule unavailable for this tick: {}", e),
        }

        match alerts {
            Ok(result) => {
                processed += 1;
                alerts_source = Some(result.source);
                match self.detect_new_alert(&result.data).await {
                    Ok(intent) => emitted.extend(intent),
                    Err(e) => {
                        tracing::warn!("Alert detection failed: {}", e);
                        failed = true;
                    }
                }
            }
            Err(e) => tracing::warn!("Alerts unavailable for this tick: {}", e),
        }

        let mut delivered = Vec::with_capacity(emitted.len());
        for intent in emitted {
            match self.sink.deliver(&intent).await {
                Ok(()) => delivered.push(intent),
                Err(e) => tracing::warn!("Dropping notification '{}': {}", intent.title, e),
            }
        }

        let outcome = if !delivered.is_empty() {
            TickOutcome::NewData
        } else if failed || processed == 0 {
            TickOutcome::Failed
        } else {
            TickOutcome::NoData
        };

        tracing::debug!(
            "Tick finished: {:?}, {} notification(s)",
            outcome,
            delivered.len()
        );

        Ok(TickReport {
            outcome,
            emitted: delivered,
            schedule_source,
            alerts_source,
        })
    }

    async fn detect_session_change(
        &self,
        rows: &[Record],
        now: NaiveDateTime,
    ) -> Result<Option<NotificationIntent>, AppError> {
        let entries = schedule_entries(rows);
        let today = today_schedule(&entries, now);
        let current = current_session(&today, now, self.policy);
        let fingerprint = current
            .map(ScheduleEntry::fingerprint)
            .unwrap_or_else(|| NO_SESSION.to_string());

        let last = self.read_fingerprint(keys::LAST_SESSION).await?;
        if last.as_deref() == Some(fingerprint.as_str()) {
            return Ok(None);
        }

        self.write_fingerprint(keys::LAST_SESSION, &fingerprint)
            .await?;
        tracing::info!("Session changed: {:?} -> {}", last, fingerprint);

        Ok(current.map(|entry| {
            NotificationIntent::new(
                SESSION_TITLE,
                format!(
                    "{} · {} - {}",
                    entry.module, entry.start_time, entry.end_time
                ),
            )
        }))
    }

    async fn detect_new_alert(
        &self,
        rows: &[Record],
    ) -> Result<Option<NotificationIntent>, AppError> {
        let alerts = alerts(rows);
        // Highest id under string ordering is the newest.
        let Some(latest) = alerts.iter().filter_map(|a| a.id.as_deref()).max() else {
            return Ok(None);
        };

        let last = self.read_fingerprint(keys::LAST_ALERT_ID).await?;
        if last.as_deref() == Some(latest) {
            return Ok(None);
        }

        self.write_fingerprint(keys::LAST_ALERT_ID, latest).await?;
        tracing::info!("New alert detected: {}", latest);

        Ok(alerts
            .iter()
            .find(|alert| alert.id.as_deref() == Some(latest))
            .map(|alert| {
                NotificationIntent::new(
                    alert
                        .title
                        .clone()
                        .unwrap_or_else(|| DEFAULT_ALERT_TITLE.to_string()),
                    alert.message.clone().unwrap_or_default(),
                )
            }))
    }

    /// Stored fingerprint, or `None` when absent or unreadable as JSON.
    async fn read_fingerprint(&self, key: &str) -> Result<Option<String>, AppError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<String>(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!("Ignoring corrupt fingerprint {}: {}", key, e);
                Ok(None)
            }
        }
    }

    async fn write_fingerprint(&self, key: &str, value: &str) -> Result<(), AppError> {
        let encoded = serde_json::to_string(value)?;
        self.store.set(key, &encoded).await
    }
}

#[async_trait]
impl TaskHandler for Notifier {
    async fn run(&self) -> TickOutcome {
        match self.run_tick(Local::now().naive_local()).await {
            Ok(report) => report.outcome,
            Err(e) => {
                tracing::warn!("Background task failed: {}", e);
                TickOutcome::Failed
            }
        }
    }
}

/// Collects delivered notifications in memory.
#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    delivered: std::sync::Mutex<Vec<NotificationIntent>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn delivered(&self) -> Vec<NotificationIntent> {
        self.delivered.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl NotificationSink for MemorySink {
    async fn deliver(&self, intent: &NotificationIntent) -> Result<(), AppError> {
        self.delivered.lock().unwrap().push(intent.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests;
