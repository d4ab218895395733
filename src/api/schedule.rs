//! Timetable endpoints.

use axum::extract::State;

use super::{ApiResponse, ApiResult};
use crate::models::{schedule_entries, ScheduleEntry};
use crate::schedule::{current_session, today_schedule, week_schedule, DaySchedule, TimePolicy};
use crate::AppState;

fn policy(state: &AppState) -> TimePolicy {
    TimePolicy::from_strict(state.config.strict_times)
}

/// GET /api/schedule/today - Sessions held today, in sheet order.
pub async fn get_today_schedule(State(state): State<AppState>) -> ApiResult<Vec<ScheduleEntry>> {
    let result = state.cache.fetch_schedule().await?;
    let today = today_schedule(&schedule_entries(&result.data), (state.now)());
    Ok(ApiResponse::fetched(today, &result))
}

/// GET /api/schedule/current - The session running right now, if any.
pub async fn get_current_session(
    State(state): State<AppState>,
) -> ApiResult<Option<ScheduleEntry>> {
    let result = state.cache.fetch_schedule().await?;
    let now = (state.now)();
    let today = today_schedule(&schedule_entries(&result.data), now);
    let current = current_session(&today, now, policy(&state)).cloned();
    Ok(ApiResponse::fetched(current, &result))
}

/// GET /api/schedule/week - Monday to Friday grouped by day.
pub async fn get_week_schedule(State(state): State<AppState>) -> ApiResult<Vec<DaySchedule>> {
    let result = state.cache.fetch_schedule().await?;
    let week = week_schedule(&schedule_entries(&result.data));
    Ok(ApiResponse::fetched(week, &result))
}
