//! Position sizing and leverage selection.

use crate::types::{Decision, Portfolio, Strategy, TradeAction};

/// Confidence above which a new position gets the full leverage cap.
pub const FULL_LEVERAGE_CONFIDENCE: f64 = 0.8;

/// Quantity that risks `risk_per_trade` percent of `cash` at `price`,
/// truncated to two decimal places. Returns 0 for a non-positive price.
pub fn position_size(cash: f64, risk_per_trade: f64, price: f64) -> f64 {
    if !price.is_finite() || price <= 0.0 || cash <= 0.0 {
        return 0.0;
    }
    let raw = cash * risk_per_trade / 100.0 / price;
    (raw * 100.0).floor() / 100.0
}

/// Size a decision against the portfolio's current cash. HOLD sizes to zero.
pub fn size(decision: &Decision, price: f64, portfolio: &Portfolio, strategy: &Strategy) -> f64 {
    match decision.action {
        TradeAction::Hold => 0.0,
        TradeAction::Buy | TradeAction::Sell => {
            position_size(portfolio.cash, strategy.risk_per_trade, price)
        }
    }
}

/// Leverage for a newly opened position.
///
/// Never below 1, so a cap of 1 always yields 1.
pub fn leverage_for(confidence: f64, max_leverage: u32) -> u32 {
    let leverage = if confidence > FULL_LEVERAGE_CONFIDENCE {
        max_leverage
    } else {
        max_leverage / 2
    };
    leverage.min(max_leverage).max(1)
}
