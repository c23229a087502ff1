//! Portfolio, position and trade types for the simulated agent.

use serde::{Deserialize, Serialize};

// =============================================================================
// Decisions
// =============================================================================

/// Recommended action for one symbol at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

/// A trading decision from the recommendation source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// Symbol the decision applies to
    pub symbol: String,
    /// Recommended action
    pub action: TradeAction,
    /// Confidence in the decision (0.0 - 1.0)
    pub confidence: f64,
    /// Free-form explanation
    #[serde(default)]
    pub reasoning: String,
    /// Suggested stop loss price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    /// Suggested take profit price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
}

impl Decision {
    pub fn new(symbol: impl Into<String>, action: TradeAction, confidence: f64) -> Self {
        Self {
            symbol: symbol.into(),
            action,
            confidence,
            reasoning: String::new(),
            stop_loss: None,
            take_profit: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_stop_loss(mut self, stop_loss: f64) -> Self {
        self.stop_loss = Some(stop_loss);
        self
    }

    pub fn with_take_profit(mut self, take_profit: f64) -> Self {
        self.take_profit = Some(take_profit);
        self
    }
}

// =============================================================================
// Positions
// =============================================================================

/// An open holding of one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Symbol (e.g., "BTC")
    pub symbol: String,
    /// Quantity held, always > 0 while the position exists
    pub quantity: f64,
    /// Volume-weighted average entry price
    pub entry_price: f64,
    /// Last mark
    pub current_price: f64,
    /// Leverage applied when the position was opened
    pub leverage: u32,
    /// (current_price - entry_price) * quantity
    pub unrealized_pnl: f64,
    /// When the position was opened (ms)
    pub entry_time: i64,
    /// Stop loss price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    /// Take profit price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
}

impl Position {
    /// Open a position at `price`.
    pub fn open(decision: &Decision, quantity: f64, price: f64, leverage: u32) -> Self {
        Self {
            symbol: decision.symbol.clone(),
            quantity,
            entry_price: price,
            current_price: price,
            leverage,
            unrealized_pnl: 0.0,
            entry_time: chrono::Utc::now().timestamp_millis(),
            stop_loss: decision.stop_loss,
            take_profit: decision.take_profit,
        }
    }

    /// Market value at the last mark.
    pub fn market_value(&self) -> f64 {
        self.current_price * self.quantity
    }

    /// Profit since entry as a percentage of the entry price.
    pub fn profit_percent(&self) -> f64 {
        if self.entry_price > 0.0 {
            (self.current_price - self.entry_price) / self.entry_price * 100.0
        } else {
            0.0
        }
    }

    /// Update the mark and recompute unrealized P&L.
    pub fn mark(&mut self, price: f64) {
        self.current_price = price;
        self.unrealized_pnl = (price - self.entry_price) * self.quantity;
    }

    /// Average a new fill into the position.
    pub fn average_in(&mut self, quantity: f64, price: f64) {
        let new_quantity = self.quantity + quantity;
        self.entry_price = (self.entry_price * self.quantity + price * quantity) / new_quantity;
        self.quantity = new_quantity;
        self.mark(price);
    }
}

// =============================================================================
// Trades
// =============================================================================

/// Side of a completed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    Buy,
    Sell,
}

/// Immutable record of a completed execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    /// Unique trade ID
    pub id: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    /// Executed quantity (for sells, the quantity actually sold)
    pub quantity: f64,
    /// Execution price
    pub price: f64,
    /// Execution timestamp (ms)
    pub timestamp: i64,
    /// Reasoning carried over from the decision
    pub reason: String,
    /// Confidence carried over from the decision
    pub confidence: f64,
}

impl Trade {
    pub fn new(decision: &Decision, trade_type: TradeType, quantity: f64, price: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: decision.symbol.clone(),
            trade_type,
            quantity,
            price,
            timestamp: chrono::Utc::now().timestamp_millis(),
            reason: decision.reasoning.clone(),
            confidence: decision.confidence,
        }
    }

    /// Cash moved by this trade.
    pub fn value(&self) -> f64 {
        self.quantity * self.price
    }
}

// =============================================================================
// Portfolio
// =============================================================================

/// The simulated account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    /// Available cash, never negative
    pub cash: f64,
    /// cash + sum of position market values
    pub total_value: f64,
    /// Open positions, unique by symbol, in opening order
    #[serde(default)]
    pub positions: Vec<Position>,
    /// Trade history, newest first
    #[serde(default)]
    pub trades: Vec<Trade>,
    /// Percent return against the initial cash baseline
    #[serde(default)]
    pub total_return: f64,
}

impl Portfolio {
    /// A fresh portfolio holding only cash.
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            total_value: initial_cash,
            positions: Vec::new(),
            trades: Vec::new(),
            total_return: 0.0,
        }
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }

    pub fn position_mut(&mut self, symbol: &str) -> Option<&mut Position> {
        self.positions.iter_mut().find(|p| p.symbol == symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.position(symbol).is_some()
    }

    /// Remove and return the position for `symbol`.
    pub fn remove_position(&mut self, symbol: &str) -> Option<Position> {
        let index = self.positions.iter().position(|p| p.symbol == symbol)?;
        Some(self.positions.remove(index))
    }

    /// Sum of position market values at their last marks.
    pub fn positions_value(&self) -> f64 {
        self.positions.iter().map(Position::market_value).sum()
    }

    /// Recompute total value and return against `initial_cash`.
    pub fn recalculate(&mut self, initial_cash: f64) {
        self.total_value = self.cash + self.positions_value();
        self.total_return = if initial_cash > 0.0 {
            (self.total_value - initial_cash) / initial_cash * 100.0
        } else {
            0.0
        };
    }

    /// Record a trade at the head of the history.
    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.insert(0, trade);
    }
}

// =============================================================================
// Signals
// =============================================================================

/// Advisory events raised while marking positions to market.
///
/// None of these close a position on their own; acting on them is left to the
/// decision source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PositionSignal {
    /// A new peak moved the trailing stop up.
    #[serde(rename_all = "camelCase")]
    TrailingStopRaised {
        symbol: String,
        peak: f64,
        stop_loss: f64,
    },
    /// Profit reached the strategy's scalping target.
    #[serde(rename_all = "camelCase")]
    ScalpingTargetReached {
        symbol: String,
        price: f64,
        profit_percent: f64,
    },
    /// Price fell to or below the stop loss.
    #[serde(rename_all = "camelCase")]
    StopLossHit {
        symbol: String,
        price: f64,
        stop_loss: f64,
    },
    /// Price rose to or above the take profit.
    #[serde(rename_all = "camelCase")]
    TakeProfitHit {
        symbol: String,
        price: f64,
        take_profit: f64,
    },
}

impl PositionSignal {
    pub fn symbol(&self) -> &str {
        match self {
            PositionSignal::TrailingStopRaised { symbol, .. }
            | PositionSignal::ScalpingTargetReached { symbol, .. }
            | PositionSignal::StopLossHit { symbol, .. }
            | PositionSignal::TakeProfitHit { symbol, .. } => symbol,
        }
    }
}
