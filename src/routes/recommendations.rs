use axum::{extract::State, Json};

use super::AppState;
use crate::{
    error::{AppError, AppResult},
    models::{RecommendationRequest, RecommendationResponse},
};

/// Handler for the recommendation endpoint. An exhausted filter set is a 404,
/// distinguishable from store failures (500).
pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    state
        .recommendations
        .recommend(request)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No movie matches the given filters".to_string()))
}
