use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::services::{QaService, RecommendationService};

pub mod movies;
pub mod qa;
pub mod recommendations;
pub mod stats;

/// Services shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub qa: Arc<QaService>,
    pub recommendations: Arc<RecommendationService>,
}

impl AppState {
    pub fn new(qa: QaService, recommendations: RecommendationService) -> Self {
        Self {
            qa: Arc::new(qa),
            recommendations: Arc::new(recommendations),
        }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/qa", post(qa::ask))
        .route("/movies/search", get(movies::search))
        .route("/movies/top", get(movies::top))
        .route("/movies/:tmdb_id", get(movies::detail))
        .route("/recommend", post(recommendations::recommend))
        .route("/stats", get(stats::stats))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
