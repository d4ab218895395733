//! Raw tab endpoints.

use axum::extract::{Path, State};

use super::{ApiResponse, ApiResult};
use crate::models::{Resource, ResourceKind};
use crate::AppState;

/// GET /api/resources/{kind} - Rows of a tab, from the network or the cache.
pub async fn get_resource(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<Resource> {
    let kind: ResourceKind = kind.parse()?;
    let result = state.cache.fetch_resource(kind).await?;
    Ok(ApiResponse::fetched(result.data.clone(), &result))
}
