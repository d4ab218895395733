//! Notifier endpoints.

use axum::extract::{Query, State};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::NotificationRecord;
use crate::notifier::TickReport;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    /// Maximum number of records (default: 50).
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// POST /api/notifier/tick - Run a detection pass now.
pub async fn run_tick(State(state): State<AppState>) -> ApiResult<TickReport> {
    let report = state.notifier.run_tick((state.now)()).await?;
    success(report)
}

/// GET /api/notifications - Delivered notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Vec<NotificationRecord>> {
    if !(1..=500).contains(&query.limit) {
        return Err(AppError::Validation(
            "limit must be between 1 and 500".to_string(),
        ));
    }
    success(state.repo.list_notifications(query.limit).await?)
}
