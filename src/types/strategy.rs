//! Strategy configuration
//!
//! A `Strategy` is the risk profile every other component reads from. It is
//! plain data: the engine never validates it, the boundary that builds one
//! (config loading, the HTTP API, a preset) calls [`Strategy::validate`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Risk profile governing gating, sizing and position management.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    /// Display name
    pub name: String,
    /// Percent of current cash risked per trade (0.5 - 5)
    pub risk_per_trade: f64,
    /// Maximum concurrent open positions (1 - 10)
    pub max_positions: u32,
    /// Minimum decision confidence as a fraction (0.50 - 0.90)
    pub min_confidence: f64,
    /// Ratchet the stop loss up behind the highest observed price
    pub use_trailing_stop: bool,
    /// Trailing distance below the peak, percent (1 - 10)
    pub trailing_stop_percent: f64,
    /// Average into an existing position instead of rejecting repeat buys
    #[serde(rename = "useDCA")]
    pub use_dca: bool,
    /// Number of averaging levels (1 - 5)
    #[serde(rename = "dcaLevels")]
    pub dca_levels: u32,
    /// Raise a signal once a position reaches the scalping target
    pub use_scalping: bool,
    /// Scalping profit target, percent (0.5 - 3)
    pub scalping_target_percent: f64,
    /// Apply calendar gating rules
    pub use_market_timing: bool,
    /// Refuse new positions on Saturdays and Sundays (requires market timing)
    pub avoid_weekends: bool,
    /// Leverage cap (1 - 20)
    pub max_leverage: u32,
    /// At most one open position per symbol
    pub diversification: bool,
}

impl Default for Strategy {
    fn default() -> Self {
        StrategyPreset::Moderate.strategy()
    }
}

/// Strategy validation failures.
#[derive(Debug, Error, PartialEq)]
pub enum StrategyError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("Strategy name must not be empty")]
    EmptyName,

    #[error("Unknown strategy preset: {0}")]
    UnknownPreset(String),
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), StrategyError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(StrategyError::OutOfRange {
            field,
            min,
            max,
            value,
        })
    }
}

impl Strategy {
    /// Check every field against its allowed range.
    ///
    /// Parameters behind a disabled toggle (trailing stop, DCA, scalping) are
    /// not checked, so a preset may carry a zero scalping target while
    /// scalping is off.
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.name.trim().is_empty() {
            return Err(StrategyError::EmptyName);
        }
        check_range("riskPerTrade", self.risk_per_trade, 0.5, 5.0)?;
        check_range("maxPositions", self.max_positions as f64, 1.0, 10.0)?;
        check_range("minConfidence", self.min_confidence, 0.5, 0.9)?;
        check_range("maxLeverage", self.max_leverage as f64, 1.0, 20.0)?;
        if self.use_trailing_stop {
            check_range("trailingStopPercent", self.trailing_stop_percent, 1.0, 10.0)?;
        }
        if self.use_dca {
            check_range("dcaLevels", self.dca_levels as f64, 1.0, 5.0)?;
        }
        if self.use_scalping {
            check_range("scalpingTargetPercent", self.scalping_target_percent, 0.5, 3.0)?;
        }
        Ok(())
    }

    /// Whether the weekend rule is active.
    pub fn blocks_weekends(&self) -> bool {
        self.use_market_timing && self.avoid_weekends
    }
}

// =============================================================================
// Presets
// =============================================================================

/// Named starting points for a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyPreset {
    Conservative,
    Moderate,
    Aggressive,
    Scalper,
}

impl StrategyPreset {
    pub const ALL: [StrategyPreset; 4] = [
        StrategyPreset::Conservative,
        StrategyPreset::Moderate,
        StrategyPreset::Aggressive,
        StrategyPreset::Scalper,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyPreset::Conservative => "conservative",
            StrategyPreset::Moderate => "moderate",
            StrategyPreset::Aggressive => "aggressive",
            StrategyPreset::Scalper => "scalper",
        }
    }

    /// Build the strategy this preset describes.
    pub fn strategy(&self) -> Strategy {
        match self {
            StrategyPreset::Conservative => Strategy {
                name: "Conservative".to_string(),
                risk_per_trade: 1.0,
                max_positions: 3,
                min_confidence: 0.75,
                use_trailing_stop: true,
                trailing_stop_percent: 2.0,
                use_dca: false,
                dca_levels: 1,
                use_scalping: false,
                scalping_target_percent: 0.0,
                use_market_timing: true,
                avoid_weekends: true,
                max_leverage: 2,
                diversification: true,
            },
            StrategyPreset::Moderate => Strategy {
                name: "Moderate".to_string(),
                risk_per_trade: 2.0,
                max_positions: 5,
                min_confidence: 0.65,
                use_trailing_stop: true,
                trailing_stop_percent: 3.0,
                use_dca: true,
                dca_levels: 2,
                use_scalping: false,
                scalping_target_percent: 0.0,
                use_market_timing: true,
                avoid_weekends: false,
                max_leverage: 10,
                diversification: true,
            },
            StrategyPreset::Aggressive => Strategy {
                name: "Aggressive".to_string(),
                risk_per_trade: 5.0,
                max_positions: 8,
                min_confidence: 0.55,
                use_trailing_stop: true,
                trailing_stop_percent: 5.0,
                use_dca: true,
                dca_levels: 3,
                use_scalping: false,
                scalping_target_percent: 0.0,
                use_market_timing: false,
                avoid_weekends: false,
                max_leverage: 20,
                diversification: false,
            },
            StrategyPreset::Scalper => Strategy {
                name: "Scalper".to_string(),
                risk_per_trade: 3.0,
                max_positions: 10,
                min_confidence: 0.6,
                use_trailing_stop: true,
                trailing_stop_percent: 1.0,
                use_dca: false,
                dca_levels: 1,
                use_scalping: true,
                scalping_target_percent: 1.5,
                use_market_timing: false,
                avoid_weekends: false,
                max_leverage: 15,
                diversification: true,
            },
        }
    }
}

impl std::str::FromStr for StrategyPreset {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conservative" => Ok(StrategyPreset::Conservative),
            "moderate" => Ok(StrategyPreset::Moderate),
            "aggressive" => Ok(StrategyPreset::Aggressive),
            "scalper" => Ok(StrategyPreset::Scalper),
            other => Err(StrategyError::UnknownPreset(other.to_string())),
        }
    }
}
