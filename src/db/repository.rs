//! SQLite repository for the key-value store and the notification outbox.
//!
//! Every write is a single statement, so each key is replaced atomically.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::KeyValueStore;
use crate::errors::AppError;
use crate::models::{NotificationIntent, NotificationRecord};
use crate::notifier::NotificationSink;

/// Database repository for all persisted state.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== KEY-VALUE OPERATIONS ====================

    /// Get a value by key.
    pub async fn get_value(&self, key: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get("value")))
    }

    /// Insert or replace a value.
    pub async fn set_value(&self, key: &str, value: &str) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ==================== NOTIFICATION OPERATIONS ====================

    /// Record a delivered notification.
    pub async fn insert_notification(
        &self,
        intent: &NotificationIntent,
    ) -> Result<NotificationRecord, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query("INSERT INTO notifications (id, title, body, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(&intent.title)
            .bind(&intent.body)
            .bind(&now)
            .execute(&self.pool)
            .await?;

        Ok(NotificationRecord {
            id,
            title: intent.title.clone(),
            body: intent.body.clone(),
            created_at: now,
        })
    }

    /// List delivered notifications, newest first.
    pub async fn list_notifications(&self, limit: i64) -> Result<Vec<NotificationRecord>, AppError> {
        let rows = sqlx::query(
            "SELECT id, title, body, created_at FROM notifications ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(notification_from_row).collect())
    }
}

#[async_trait]
impl KeyValueStore for Repository {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.get_value(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.set_value(key, value).await
    }
}

/// Delivers by writing to the outbox the client polls.
#[async_trait]
impl NotificationSink for Repository {
    async fn deliver(&self, intent: &NotificationIntent) -> Result<(), AppError> {
        let record = self.insert_notification(intent).await?;
        tracing::info!("Notification {}: {} | {}", record.id, record.title, record.body);
        Ok(())
    }
}

fn notification_from_row(row: &sqlx::sqlite::SqliteRow) -> NotificationRecord {
    NotificationRecord {
        id: row.get("id"),
        title: row.get("title"),
        body: row.get("body"),
        created_at: row.get("created_at"),
    }
}
