use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, DeletedResponse};
use crate::api::validation::validate_id;
use crate::db::{ListSyncInput, ListSyncRecord};
use crate::services::ListSyncError;

impl From<ListSyncError> for ApiError {
    fn from(err: ListSyncError) -> Self {
        match err {
            ListSyncError::AlreadyRunning => Self::conflict(err.to_string()),
            ListSyncError::ClientNotFound(id) => Self::not_found("Client", id),
            ListSyncError::SourceListNotFound(_) => Self::NotFound(err.to_string()),
            ListSyncError::Client(e) => e.into(),
            ListSyncError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

pub async fn list_list_syncs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<ListSyncRecord>>>, ApiError> {
    let syncs = state.store().list_list_syncs().await?;
    Ok(Json(ApiResponse::success(syncs)))
}

/// `POST /api/list-syncs`
///
/// Both clients must exist and may not be the same.
pub async fn create_list_sync(
    State(state): State<Arc<AppState>>,
    Json(mut payload): Json<ListSyncInput>,
) -> Result<Json<ApiResponse<ListSyncRecord>>, ApiError> {
    payload.name = payload.name.trim().to_string();
    payload.source_list_id = payload.source_list_id.trim().to_string();

    if payload.name.is_empty() {
        return Err(ApiError::validation("List sync name cannot be empty"));
    }
    if payload.source_list_id.is_empty() {
        return Err(ApiError::validation("Source list id cannot be empty"));
    }
    validate_id("client", payload.source_client_id)?;
    validate_id("client", payload.target_client_id)?;
    if payload.source_client_id == payload.target_client_id {
        return Err(ApiError::validation(
            "Source and target client must be different",
        ));
    }

    for id in [payload.source_client_id, payload.target_client_id] {
        if state.store().get_client(id).await?.is_none() {
            return Err(ApiError::not_found("Client", id));
        }
    }

    let sync = state.store().create_list_sync(&payload).await?;
    Ok(Json(ApiResponse::success(sync)))
}

pub async fn delete_list_sync(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    let id = validate_id("list sync", id)?;
    if !state.store().delete_list_sync(id).await? {
        return Err(ApiError::not_found("List sync", id));
    }
    Ok(Json(ApiResponse::success(DeletedResponse { id, deleted: true })))
}
