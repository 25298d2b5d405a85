use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, LimitQuery, MediaSyncRequest};
use crate::api::validation::{validate_id, validate_limit};
use crate::db::JobRun;
use crate::services::SyncError;

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::AlreadyRunning => Self::conflict(err.to_string()),
            SyncError::ClientNotFound(id) => Self::not_found("Client", id),
            SyncError::Client(e) => e.into(),
            SyncError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

/// `GET /api/jobs?limit=`
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<JobRun>>>, ApiError> {
    let limit = validate_limit(query.limit.unwrap_or(20))?;
    let runs = state
        .store()
        .list_job_runs(u64::try_from(limit).unwrap_or(1000))
        .await?;
    Ok(Json(ApiResponse::success(runs)))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<JobRun>>, ApiError> {
    let id = validate_id("job run", id)?;
    let run = state
        .store()
        .get_job_run(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job run", id))?;
    Ok(Json(ApiResponse::success(run)))
}

/// `POST /api/jobs/media-sync`
///
/// Body is optional; `{"client_id": n}` limits the run to one client.
pub async fn trigger_media_sync(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ApiResponse<JobRun>>, ApiError> {
    let request: MediaSyncRequest = if body.iter().all(u8::is_ascii_whitespace) {
        MediaSyncRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::validation(format!("Invalid request body: {e}")))?
    };
    if let Some(id) = request.client_id {
        validate_id("client", id)?;
    }

    let run = state.shared.media_sync.trigger(request.client_id).await?;
    Ok(Json(ApiResponse::success(run)))
}

/// `POST /api/jobs/list-sync`
pub async fn trigger_list_sync(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<JobRun>>, ApiError> {
    let run = state.shared.list_sync.trigger().await?;
    Ok(Json(ApiResponse::success(run)))
}

/// `POST /api/jobs/recommendations`
pub async fn trigger_recommendations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<JobRun>>, ApiError> {
    let run = state.shared.recommendations.trigger().await?;
    Ok(Json(ApiResponse::success(run)))
}
