//! Risk gate: may a proposed BUY open or add to a position?

use crate::types::{Decision, Portfolio, Strategy};
use chrono::{Datelike, Weekday};
use serde::Serialize;
use thiserror::Error;

/// Why the gate refused a position.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum GateDenial {
    #[error("position limit reached: {open} of {max} open")]
    MaxPositions { open: usize, max: u32 },

    #[error("confidence {confidence} below minimum {min}")]
    LowConfidence { confidence: f64, min: f64 },

    #[error("already holding {symbol}")]
    AlreadyHolding { symbol: String },

    #[error("weekend trading is disabled")]
    Weekend,
}

pub fn is_weekend<D: Datelike>(date: &D) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Evaluate every rule, reporting the first one that fails.
pub fn check<D: Datelike>(
    decision: &Decision,
    portfolio: &Portfolio,
    strategy: &Strategy,
    now: &D,
) -> Result<(), GateDenial> {
    let open = portfolio.positions.len();
    if open >= strategy.max_positions as usize {
        return Err(GateDenial::MaxPositions {
            open,
            max: strategy.max_positions,
        });
    }

    if decision.confidence < strategy.min_confidence {
        return Err(GateDenial::LowConfidence {
            confidence: decision.confidence,
            min: strategy.min_confidence,
        });
    }

    if strategy.diversification && portfolio.has_position(&decision.symbol) {
        return Err(GateDenial::AlreadyHolding {
            symbol: decision.symbol.clone(),
        });
    }

    if strategy.blocks_weekends() && is_weekend(now) {
        return Err(GateDenial::Weekend);
    }

    Ok(())
}

pub fn can_open<D: Datelike>(
    decision: &Decision,
    portfolio: &Portfolio,
    strategy: &Strategy,
    now: &D,
) -> bool {
    check(decision, portfolio, strategy, now).is_ok()
}
