use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, DeletedResponse, MediaQuery};
use crate::api::validation::{validate_id, validate_limit, validate_media_type};
use crate::db::{MediaFilter, StoredMediaItem};
use crate::services::{MediaError, MediaPage};

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::NotFound(id) => Self::not_found("Media item", id),
            MediaError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

fn filter_from_query(query: MediaQuery) -> Result<MediaFilter, ApiError> {
    let media_type = query
        .media_type
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(validate_media_type)
        .transpose()?;

    let client_id = query
        .client_id
        .map(|id| validate_id("client", id))
        .transpose()?;

    let limit = validate_limit(query.limit.unwrap_or(50))?;
    let page = query.page.unwrap_or(1);
    if page == 0 {
        return Err(ApiError::validation("Page number must be >= 1"));
    }

    Ok(MediaFilter {
        media_type,
        query: query.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
        year: query.year,
        client_id,
        page,
        limit: u32::try_from(limit).unwrap_or(1000),
    })
}

/// `GET /api/media?type=&q=&year=&client_id=&page=&limit=`
pub async fn list_media(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MediaQuery>,
) -> Result<Json<ApiResponse<MediaPage>>, ApiError> {
    let filter = filter_from_query(query)?;
    let page = state.media_service().list(filter).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn get_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<StoredMediaItem>>, ApiError> {
    let id = validate_id("media item", id)?;
    let item = state.media_service().get(id).await?;
    Ok(Json(ApiResponse::success(item)))
}

pub async fn delete_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    let id = validate_id("media item", id)?;
    state.media_service().delete(id).await?;
    Ok(Json(ApiResponse::success(DeletedResponse { id, deleted: true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaType;

    fn query() -> MediaQuery {
        MediaQuery {
            media_type: None,
            q: None,
            year: None,
            client_id: None,
            page: None,
            limit: None,
        }
    }

    #[test]
    fn test_filter_defaults() {
        let filter = filter_from_query(query()).unwrap();
        assert_eq!(filter.page, 1);
        assert_eq!(filter.limit, 50);
        assert!(filter.media_type.is_none());
    }

    #[test]
    fn test_filter_parses_and_rejects() {
        let mut q = query();
        q.media_type = Some("tracks".into());
        q.q = Some("  ".into());
        let filter = filter_from_query(q).unwrap();
        assert_eq!(filter.media_type, Some(MediaType::Track));
        assert!(filter.query.is_none());

        let mut q = query();
        q.media_type = Some("podcast".into());
        assert!(filter_from_query(q).is_err());

        let mut q = query();
        q.limit = Some(0);
        assert!(filter_from_query(q).is_err());

        let mut q = query();
        q.page = Some(0);
        assert!(filter_from_query(q).is_err());
    }
}
