//! Trade execution: applies a BUY or SELL to the portfolio.
//!
//! Every check runs before the first mutation, so a rejected trade leaves the
//! portfolio and the trailing ledger exactly as they were.

use super::gate;
use super::sizer::leverage_for;
use super::trailing::TrailingStops;
use super::TradingError;
use crate::types::{Decision, Portfolio, Position, Strategy, Trade, TradeAction, TradeType};
use chrono::Datelike;
use tracing::{debug, info};

/// Quantities below this are treated as fully closed.
pub const QUANTITY_EPSILON: f64 = 1e-9;

fn validate_inputs(price: f64, quantity: f64) -> Result<(), TradingError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(TradingError::InvalidPrice(price));
    }
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(TradingError::InvalidQuantity(quantity));
    }
    Ok(())
}

/// Apply `decision` at `price` for `quantity` units. HOLD yields `Ok(None)`.
pub fn execute<D: Datelike>(
    portfolio: &mut Portfolio,
    trailing: &mut TrailingStops,
    strategy: &Strategy,
    decision: &Decision,
    price: f64,
    quantity: f64,
    now: &D,
) -> Result<Option<Trade>, TradingError> {
    let trade = match decision.action {
        TradeAction::Hold => return Ok(None),
        TradeAction::Buy => {
            validate_inputs(price, quantity)?;
            buy(portfolio, trailing, strategy, decision, price, quantity, now)?
        }
        TradeAction::Sell => {
            validate_inputs(price, quantity)?;
            sell(portfolio, trailing, decision, price, quantity)?
        }
    };

    portfolio.record_trade(trade.clone());
    Ok(Some(trade))
}

fn buy<D: Datelike>(
    portfolio: &mut Portfolio,
    trailing: &mut TrailingStops,
    strategy: &Strategy,
    decision: &Decision,
    price: f64,
    quantity: f64,
    now: &D,
) -> Result<Trade, TradingError> {
    gate::check(decision, portfolio, strategy, now)?;

    let cost = quantity * price;
    if cost > portfolio.cash {
        return Err(TradingError::InsufficientFunds {
            needed: cost,
            available: portfolio.cash,
        });
    }

    let symbol = decision.symbol.as_str();
    let existing = portfolio.has_position(symbol);
    if existing && !strategy.use_dca {
        return Err(TradingError::DuplicatePosition(symbol.to_string()));
    }

    portfolio.cash -= cost;

    if let Some(position) = portfolio.position_mut(symbol) {
        position.average_in(quantity, price);
        position.stop_loss = decision.stop_loss;
        position.take_profit = decision.take_profit;
        debug!(
            "Averaged into {}: {} @ {:.4} avg",
            symbol, position.quantity, position.entry_price
        );
    } else {
        let leverage = leverage_for(decision.confidence, strategy.max_leverage);
        portfolio
            .positions
            .push(Position::open(decision, quantity, price, leverage));
    }

    if strategy.use_trailing_stop {
        trailing.seed(symbol, price);
    }

    info!("BUY {} {} @ {} (cost {:.2})", quantity, symbol, price, cost);
    Ok(Trade::new(decision, TradeType::Buy, quantity, price))
}

fn sell(
    portfolio: &mut Portfolio,
    trailing: &mut TrailingStops,
    decision: &Decision,
    price: f64,
    quantity: f64,
) -> Result<Trade, TradingError> {
    let symbol = decision.symbol.as_str();
    let position = portfolio
        .position_mut(symbol)
        .ok_or_else(|| TradingError::PositionNotFound(symbol.to_string()))?;

    // A remainder below the dust threshold is sold with the rest.
    let mut sell_quantity = quantity.min(position.quantity);
    if position.quantity - sell_quantity < QUANTITY_EPSILON {
        sell_quantity = position.quantity;
    }
    position.quantity -= sell_quantity;
    position.mark(price);
    let remaining = position.quantity;

    if remaining <= 0.0 {
        portfolio.remove_position(symbol);
        trailing.remove(symbol);
        debug!("Closed position {}", symbol);
    }

    let proceeds = sell_quantity * price;
    portfolio.cash += proceeds;

    info!(
        "SELL {} {} @ {} (proceeds {:.2})",
        sell_quantity, symbol, price, proceeds
    );
    Ok(Trade::new(decision, TradeType::Sell, sell_quantity, price))
}
