//! Portfolio API
//!
//! - GET /api/portfolio - Current portfolio snapshot
//! - POST /api/portfolio/reset - Reset to the initial balance
//! - GET /api/portfolio/strategy - Active strategy
//! - PUT /api/portfolio/strategy - Replace the strategy
//! - GET /api/portfolio/strategy/presets - Built-in strategies
//! - GET /api/portfolio/balance - Initial balance
//! - PUT /api/portfolio/balance - Change the initial balance
//! - POST /api/portfolio/eligibility - Would a decision pass the risk gate?
//! - POST /api/portfolio/size - Position size for a decision
//! - POST /api/portfolio/trades - Execute a decision
//! - POST /api/portfolio/prices - Mark positions to new prices

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{ApiResponse, ErrorResponse};
use crate::error;
use crate::services::{GateDenial, TradingError};
use crate::types::{Decision, Portfolio, PositionSignal, Strategy, StrategyPreset, Trade};
use crate::AppState;

/// Create portfolio router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_portfolio))
        .route("/reset", post(reset_portfolio))
        .route("/strategy", get(get_strategy).put(set_strategy))
        .route("/strategy/presets", get(list_presets))
        .route("/balance", get(get_balance).put(set_balance))
        .route("/eligibility", post(check_eligibility))
        .route("/size", post(calculate_size))
        .route("/trades", post(execute_trade))
        .route("/prices", post(update_prices))
}

/// Convert TradingError to HTTP response.
impl IntoResponse for TradingError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            TradingError::GateDenied(_) => (StatusCode::UNPROCESSABLE_ENTITY, "GATE_DENIED"),
            TradingError::InsufficientFunds { .. } => {
                (StatusCode::BAD_REQUEST, "INSUFFICIENT_FUNDS")
            }
            TradingError::PositionNotFound(_) => (StatusCode::NOT_FOUND, "POSITION_NOT_FOUND"),
            TradingError::DuplicatePosition(_) => (StatusCode::CONFLICT, "DUPLICATE_POSITION"),
            TradingError::InvalidPrice(_) => (StatusCode::BAD_REQUEST, "INVALID_PRICE"),
            TradingError::InvalidQuantity(_) => (StatusCode::BAD_REQUEST, "INVALID_QUANTITY"),
            TradingError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceBody {
    pub amount: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityResponse {
    pub can_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial: Option<GateDenial>,
}

#[derive(Debug, Deserialize)]
pub struct SizeRequest {
    pub decision: Decision,
    pub price: f64,
}

#[derive(Debug, Serialize)]
pub struct SizeResponse {
    pub quantity: f64,
}

#[derive(Debug, Deserialize)]
pub struct TradeRequest {
    pub decision: Decision,
    pub price: f64,
    pub quantity: f64,
}

#[derive(Debug, Deserialize)]
pub struct PricesRequest {
    pub prices: HashMap<String, f64>,
}

#[derive(Debug, Serialize)]
pub struct PricesResponse {
    pub signals: Vec<PositionSignal>,
    pub portfolio: Portfolio,
}

#[derive(Debug, Serialize)]
pub struct PresetEntry {
    pub id: StrategyPreset,
    pub strategy: Strategy,
}

// =============================================================================
// Handlers
// =============================================================================

async fn get_portfolio(State(state): State<AppState>) -> Json<ApiResponse<Portfolio>> {
    Json(ApiResponse {
        data: state.manager.get_portfolio(),
    })
}

async fn reset_portfolio(State(state): State<AppState>) -> Json<ApiResponse<Portfolio>> {
    Json(ApiResponse {
        data: state.agent.reset(),
    })
}

async fn get_strategy(State(state): State<AppState>) -> Json<ApiResponse<Strategy>> {
    Json(ApiResponse {
        data: state.manager.strategy().as_ref().clone(),
    })
}

/// PUT /api/portfolio/strategy
///
/// Validated here; the engine trusts whatever it is given.
async fn set_strategy(
    State(state): State<AppState>,
    Json(strategy): Json<Strategy>,
) -> error::Result<Json<ApiResponse<Strategy>>> {
    strategy.validate()?;
    state.manager.set_strategy(strategy.clone());
    Ok(Json(ApiResponse { data: strategy }))
}

async fn list_presets() -> Json<ApiResponse<Vec<PresetEntry>>> {
    let presets = StrategyPreset::ALL
        .iter()
        .map(|preset| PresetEntry {
            id: *preset,
            strategy: preset.strategy(),
        })
        .collect();
    Json(ApiResponse { data: presets })
}

async fn get_balance(State(state): State<AppState>) -> Json<ApiResponse<BalanceBody>> {
    Json(ApiResponse {
        data: BalanceBody {
            amount: state.manager.get_initial_balance(),
        },
    })
}

async fn set_balance(
    State(state): State<AppState>,
    Json(body): Json<BalanceBody>,
) -> Result<Json<ApiResponse<BalanceBody>>, TradingError> {
    state.manager.set_initial_balance(body.amount)?;
    Ok(Json(ApiResponse { data: body }))
}

async fn check_eligibility(
    State(state): State<AppState>,
    Json(decision): Json<Decision>,
) -> Json<ApiResponse<EligibilityResponse>> {
    let denial = state.manager.check_open_position(&decision).err();
    Json(ApiResponse {
        data: EligibilityResponse {
            can_open: denial.is_none(),
            denial,
        },
    })
}

async fn calculate_size(
    State(state): State<AppState>,
    Json(request): Json<SizeRequest>,
) -> Result<Json<ApiResponse<SizeResponse>>, TradingError> {
    let quantity = state
        .manager
        .calculate_position_size(&request.decision, request.price)?;
    Ok(Json(ApiResponse {
        data: SizeResponse { quantity },
    }))
}

/// POST /api/portfolio/trades
///
/// A HOLD decision returns `data: null`.
async fn execute_trade(
    State(state): State<AppState>,
    Json(request): Json<TradeRequest>,
) -> Result<Json<ApiResponse<Option<Trade>>>, TradingError> {
    let trade = state
        .manager
        .execute_trade(&request.decision, request.price, request.quantity)?;
    Ok(Json(ApiResponse { data: trade }))
}

async fn update_prices(
    State(state): State<AppState>,
    Json(request): Json<PricesRequest>,
) -> Json<ApiResponse<PricesResponse>> {
    let signals = state.manager.update_positions(&request.prices);
    Json(ApiResponse {
        data: PricesResponse {
            signals,
            portfolio: state.manager.get_portfolio(),
        },
    })
}
