use axum::{
    Json,
    extract::{Query, State},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, MetadataSearchQuery};
use crate::api::validation::{validate_media_type, validate_search_query};
use crate::models::{AnyMediaItem, MediaType};
use crate::services::MetadataError;

impl From<MetadataError> for ApiError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::Disabled => Self::not_implemented("TMDB is not enabled"),
            MetadataError::UnsupportedType(kind) => {
                Self::validation(format!("Metadata search supports movie and series, not {kind}"))
            }
            MetadataError::Client(e) => e.into(),
        }
    }
}

/// `GET /api/metadata/search?q=&type=movie|series&year=`
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MetadataSearchQuery>,
) -> Result<Json<ApiResponse<Vec<AnyMediaItem>>>, ApiError> {
    let q = validate_search_query(&query.q)?;
    let kind = query
        .media_type
        .as_deref()
        .map(validate_media_type)
        .transpose()?
        .unwrap_or(MediaType::Movie);

    let results = state.shared.metadata.search(q, kind, query.year).await?;
    Ok(Json(ApiResponse::success(results)))
}
