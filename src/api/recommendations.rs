use axum::{
    Json,
    extract::{Query, State},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, LimitQuery};
use crate::api::validation::validate_limit;
use crate::db::{JobRun, Recommendation};
use crate::services::RecommendationError;

impl From<RecommendationError> for ApiError {
    fn from(err: RecommendationError) -> Self {
        match err {
            RecommendationError::NoProvider => {
                Self::not_implemented("Enable Claude or TMDB to get recommendations")
            }
            RecommendationError::AlreadyRunning => Self::conflict(err.to_string()),
            RecommendationError::Parse(message) => Self::ExternalApiError {
                service: "Claude".to_string(),
                message,
            },
            RecommendationError::Client(e) => e.into(),
            RecommendationError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

/// `GET /api/recommendations?limit=`
pub async fn list_recommendations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<Recommendation>>>, ApiError> {
    let limit = validate_limit(query.limit.unwrap_or(50))?;
    let items = state
        .shared
        .recommendations
        .list(u64::try_from(limit).unwrap_or(1000))
        .await?;
    Ok(Json(ApiResponse::success(items)))
}

/// `POST /api/recommendations/refresh`
///
/// Starts a refresh in the background and returns its job run.
pub async fn refresh_recommendations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<JobRun>>, ApiError> {
    let run = state.shared.recommendations.trigger().await?;
    Ok(Json(ApiResponse::success(run)))
}
