pub mod agent;
pub mod health;
pub mod portfolio;

use crate::AppState;
use axum::Router;
use serde::Serialize;

/// Success envelope shared by all endpoints.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/portfolio", portfolio::router())
        .nest("/api/agent", agent::router())
}
