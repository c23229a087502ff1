//! Portfolio Engine
//!
//! Keeps a single simulated portfolio consistent under a risk strategy:
//! - Risk gate (may a BUY proceed?)
//! - Position sizing and leverage selection
//! - Trade execution with cost averaging and no overselling
//! - Mark-to-market with trailing stops and advisory signals
//!
//! [`PortfolioManager`] owns the state and sequences the pieces; the
//! submodules are pure functions over that state.

pub mod executor;
pub mod gate;
pub mod manager;
pub mod mark;
pub mod sizer;
pub mod trailing;

pub use gate::GateDenial;
pub use manager::{Clock, PortfolioManager, DEFAULT_INITIAL_CASH};
pub use trailing::TrailingStops;

use thiserror::Error;

/// Reasons a trade request did not produce a trade.
#[derive(Debug, Error, PartialEq)]
pub enum TradingError {
    #[error("Position rejected: {0}")]
    GateDenied(#[from] GateDenial),

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: f64, available: f64 },

    #[error("No open position for {0}")]
    PositionNotFound(String),

    #[error("Position already open for {0} and averaging is disabled")]
    DuplicatePosition(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(f64),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(f64),

    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),
}
