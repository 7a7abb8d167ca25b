use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::AppState;
use crate::{
    error::AppResult,
    models::{MovieDetailResponse, MovieSummary, SearchParams, SearchResponse, TopParams},
};

/// Handler for hybrid title search
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<SearchResponse>> {
    let response = state.qa.search(&params.q, params.limit).await?;
    Ok(Json(response))
}

pub async fn top(
    State(state): State<AppState>,
    Query(params): Query<TopParams>,
) -> AppResult<Json<Vec<MovieSummary>>> {
    let movies = state.qa.top(params.by, params.limit).await?;
    Ok(Json(movies))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(tmdb_id): Path<i64>,
) -> AppResult<Json<MovieDetailResponse>> {
    let detail = state.qa.movie_detail(tmdb_id).await?;
    Ok(Json(detail))
}
