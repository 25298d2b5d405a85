//! System API endpoints.
//!
//! Status and configuration management. All business logic is delegated to
//! [`SystemService`](crate::services::SystemService).

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::config::Config;
use crate::services::system_service::SystemError;

#[derive(Debug, Serialize)]
pub struct HealthLiveResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthReadyResponse {
    pub ready: bool,
    pub database: bool,
}

impl From<SystemError> for ApiError {
    fn from(err: SystemError) -> Self {
        match err {
            SystemError::Validation(msg) => Self::validation(msg),
            SystemError::Database(msg) => Self::DatabaseError(msg),
            SystemError::Internal(msg) => Self::internal(msg),
        }
    }
}

/// `GET /api/system/status`
///
/// Version, uptime, library counts per type, client count and the last
/// sync runs.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<super::SystemStatus>>, ApiError> {
    let status = state
        .system_service()
        .get_status(
            state.start_time.elapsed().as_secs(),
            env!("CARGO_PKG_VERSION"),
        )
        .await?;

    Ok(Json(ApiResponse::success(status)))
}

/// `GET /api/system/config`
///
/// Secrets are replaced with `********`.
pub async fn get_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Config>>, ApiError> {
    let config = state.system_service().get_config().await?;
    Ok(Json(ApiResponse::success(config)))
}

/// `PUT /api/system/config`
///
/// A masked secret in the body keeps the current value.
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(new_config): Json<Config>,
) -> Result<Json<ApiResponse<Config>>, ApiError> {
    let config = state.system_service().update_config(new_config).await?;
    Ok(Json(ApiResponse::success(config)))
}

/// `GET /api/system/health/live`
pub async fn health_live() -> impl IntoResponse {
    Json(ApiResponse::success(HealthLiveResponse { status: "alive" }))
}

/// `GET /api/system/health/ready`
pub async fn health_ready(State(state): State<Arc<AppState>>) -> Response {
    let database = state.store().ping().await.is_ok();
    let body = Json(ApiResponse::success(HealthReadyResponse {
        ready: database,
        database,
    }));

    if database {
        (StatusCode::OK, body).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
    }
}
