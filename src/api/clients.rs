use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, DeletedResponse};
use crate::api::validation::validate_id;
use crate::clients::{ClientKind, ServerInfo};
use crate::models::{ClientInput, ClientRecord, MediaItem, Playlist};
use crate::services::ClientServiceError;

/// Body of `POST /api/clients` and `PUT /api/clients/{id}`.
///
/// `kind` stays a string so an unknown kind is a validation error.
#[derive(Debug, Deserialize)]
pub struct ClientRequest {
    pub name: String,
    pub kind: String,
    #[serde(alias = "url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl TryFrom<ClientRequest> for ClientInput {
    type Error = ApiError;

    fn try_from(req: ClientRequest) -> Result<Self, Self::Error> {
        let kind = req.kind.parse::<ClientKind>()?;
        Ok(Self {
            name: req.name,
            kind,
            base_url: req.base_url,
            api_key: req.api_key,
            username: req.username,
            password: req.password,
            user_id: req.user_id,
            enabled: req.enabled.unwrap_or(true),
        })
    }
}

impl From<ClientServiceError> for ApiError {
    fn from(err: ClientServiceError) -> Self {
        match err {
            ClientServiceError::NotFound(id) => Self::not_found("Client", id),
            ClientServiceError::Conflict(msg) => Self::Conflict(msg),
            ClientServiceError::Validation(msg) => Self::validation(msg),
            ClientServiceError::Database(msg) => Self::DatabaseError(msg),
            ClientServiceError::Client(e) => e.into(),
        }
    }
}

pub async fn list_clients(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<ClientRecord>>>, ApiError> {
    let clients = state.client_service().list().await?;
    Ok(Json(ApiResponse::success(clients)))
}

pub async fn get_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<ClientRecord>>, ApiError> {
    let id = validate_id("client", id)?;
    let client = state.client_service().get(id).await?;
    Ok(Json(ApiResponse::success(client)))
}

pub async fn create_client(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ClientRequest>,
) -> Result<Json<ApiResponse<ClientRecord>>, ApiError> {
    let input = ClientInput::try_from(payload)?;
    let client = state.client_service().create(input).await?;
    Ok(Json(ApiResponse::success(client)))
}

pub async fn update_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<ClientRequest>,
) -> Result<Json<ApiResponse<ClientRecord>>, ApiError> {
    let id = validate_id("client", id)?;
    let input = ClientInput::try_from(payload)?;
    let client = state.client_service().update(id, input).await?;
    Ok(Json(ApiResponse::success(client)))
}

pub async fn delete_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    let id = validate_id("client", id)?;
    state.client_service().delete(id).await?;
    Ok(Json(ApiResponse::success(DeletedResponse { id, deleted: true })))
}

/// `POST /api/clients/{id}/test`
pub async fn test_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<ServerInfo>>, ApiError> {
    let id = validate_id("client", id)?;
    let info = state.client_service().test_connection(id).await?;
    Ok(Json(ApiResponse::success(info)))
}

/// `GET /api/clients/{id}/playlists`
pub async fn list_playlists(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<MediaItem<Playlist>>>>, ApiError> {
    let id = validate_id("client", id)?;
    let playlists = state.client_service().playlists(id).await?;
    Ok(Json(ApiResponse::success(playlists)))
}
