use axum::{extract::State, Json};

use super::AppState;
use crate::{
    error::AppResult,
    models::{QaResponse, QuestionRequest},
};

/// Handler for the question-answering endpoint
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<QuestionRequest>,
) -> AppResult<Json<QaResponse>> {
    let response = state.qa.answer(request).await?;
    Ok(Json(response))
}
