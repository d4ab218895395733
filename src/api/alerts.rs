//! Alert and shared todo endpoints.

use axum::extract::State;
use serde::Serialize;

use super::{ApiResponse, ApiResult};
use crate::models::{alerts, shared_todos, SharedTodo};
use crate::schedule::{partition_alerts, time_left_label, AlertGroups};
use crate::AppState;

/// GET /api/alerts - Alerts split into important (high/medium) and general.
pub async fn get_alerts(State(state): State<AppState>) -> ApiResult<AlertGroups> {
    let result = state.cache.fetch_alerts().await?;
    let groups = partition_alerts(alerts(&result.data));
    Ok(ApiResponse::fetched(groups, &result))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedTodoItem {
    #[serde(flatten)]
    pub todo: SharedTodo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_left: Option<String>,
}

/// GET /api/todos/shared - The shared todo tab with a time-left label per item.
pub async fn get_shared_todos(State(state): State<AppState>) -> ApiResult<Vec<SharedTodoItem>> {
    let result = state.cache.fetch_shared_todos().await?;
    let now = (state.now)();
    let items = shared_todos(&result.data)
        .into_iter()
        .map(|todo| {
            let time_left = todo
                .due_at
                .as_deref()
                .and_then(|due_at| time_left_label(due_at, now));
            SharedTodoItem { todo, time_left }
        })
        .collect();
    Ok(ApiResponse::fetched(items, &result))
}
