//! REST API module.
//!
//! Foreground reads go straight through the resource cache; stale data is served
//! with a `warning` next to it rather than as an error.

mod alerts;
mod background;
mod notifications;
mod resources;
mod schedule;

pub use alerts::*;
pub use background::*;
pub use notifications::*;
pub use resources::*;
pub use schedule::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{FetchResult, Source};

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            source: None,
            warning: None,
        }
    }

    /// Attach provenance of the underlying fetch.
    pub fn fetched(data: T, fetch: &FetchResult) -> Self {
        Self {
            success: true,
            data,
            source: Some(fetch.source),
            warning: fetch
                .is_stale()
                .then(|| fetch.error.as_ref().map(ToString::to_string))
                .flatten(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}
