//! Background registration endpoints.

use axum::extract::State;
use serde::Serialize;

use super::{success, ApiResult};
use crate::scheduler::{Registration, SchedulerStatus};
use crate::AppState;

/// GET /api/background - Host status and registration state.
pub async fn get_background_status(State(state): State<AppState>) -> ApiResult<SchedulerStatus> {
    success(state.scheduler.status().await)
}

/// POST /api/background - Register the periodic tick (no-op when already registered).
pub async fn register_background(State(state): State<AppState>) -> ApiResult<Registration> {
    let registration = state.scheduler.register().await?;
    success(registration)
}

#[derive(Debug, Serialize)]
pub struct Unregistered {
    pub removed: bool,
}

/// DELETE /api/background - Stop the periodic tick.
pub async fn unregister_background(State(state): State<AppState>) -> ApiResult<Unregistered> {
    success(Unregistered {
        removed: state.scheduler.unregister().await,
    })
}
