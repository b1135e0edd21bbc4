//! REST API module.
//!
//! Contains all API routes and handlers of the order server.

mod admin;
mod events;
mod orders;
mod sync;

pub use admin::*;
pub use events::*;
pub use orders::*;
pub use sync::*;

use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::{AppError, AppErrorWithSync};
use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub last_sync: DateTime<Utc>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, last_sync: DateTime<Utc>) -> Self {
        Self {
            success: true,
            data,
            last_sync,
            status: StatusCode::OK,
        }
    }

    /// Respond with `201 Created` instead of `200 OK`.
    pub fn created(mut self) -> Self {
        self.status = StatusCode::CREATED;
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppErrorWithSync>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, last_sync: DateTime<Utc>) -> ApiResult<T> {
    Ok(ApiResponse::new(data, last_sync))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: AppError, last_sync: DateTime<Utc>) -> ApiResult<T> {
    Err(AppErrorWithSync {
        error: err,
        last_sync: Some(last_sync),
    })
}

/// Fallback for unknown `/api/*` paths.
pub async fn api_not_found(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> AppErrorWithSync {
    AppErrorWithSync {
        error: AppError::NotFound(format!("No API endpoint at {}", uri.path())),
        last_sync: Some(state.store.last_sync().await),
    }
}
