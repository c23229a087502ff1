//! Agent API
//!
//! - POST /api/agent/tick - Run one tick with supplied prices and decisions
//! - GET /api/agent/reports - Recent decision reports
//! - GET /api/agent/enabled - Whether ticks run
//! - PUT /api/agent/enabled - Enable or disable ticks

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ApiResponse;
use crate::error::AppError;
use crate::services::{DecisionReport, ScriptedDecisions, TickOutcome};
use crate::types::Decision;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tick", post(tick))
        .route("/reports", get(list_reports))
        .route("/enabled", get(get_enabled).put(set_enabled))
}

#[derive(Debug, Deserialize)]
pub struct TickRequest {
    pub prices: HashMap<String, f64>,
    #[serde(default)]
    pub decisions: Vec<Decision>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnabledBody {
    pub enabled: bool,
}

/// POST /api/agent/tick
///
/// Responds 409 when the tick was skipped.
async fn tick(
    State(state): State<AppState>,
    Json(request): Json<TickRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.prices.is_empty() {
        return Err(AppError::BadRequest("prices must not be empty".to_string()));
    }

    let source = ScriptedDecisions::new(request.decisions);
    let outcome = state.agent.tick(&request.prices, &source).await;

    let status = match outcome {
        TickOutcome::Completed(_) => StatusCode::OK,
        TickOutcome::Skipped { .. } => StatusCode::CONFLICT,
    };
    Ok((status, Json(ApiResponse { data: outcome })))
}

async fn list_reports(State(state): State<AppState>) -> Json<ApiResponse<Vec<DecisionReport>>> {
    Json(ApiResponse {
        data: state.agent.recent_reports(),
    })
}

async fn get_enabled(State(state): State<AppState>) -> Json<ApiResponse<EnabledBody>> {
    Json(ApiResponse {
        data: EnabledBody {
            enabled: state.agent.is_enabled(),
        },
    })
}

async fn set_enabled(
    State(state): State<AppState>,
    Json(body): Json<EnabledBody>,
) -> Json<ApiResponse<EnabledBody>> {
    state.agent.set_enabled(body.enabled);
    Json(ApiResponse { data: body })
}
