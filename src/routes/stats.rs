use axum::{extract::State, Json};

use super::AppState;
use crate::{error::AppResult, models::StatsResponse};

pub async fn stats(State(state): State<AppState>) -> AppResult<Json<StatsResponse>> {
    Ok(Json(state.qa.stats().await?))
}
