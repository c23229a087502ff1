//! Trading agent: drives the portfolio engine one tick at a time.
//!
//! A tick takes the latest prices, asks a [`DecisionSource`] for a decision
//! on every symbol with enough price history, executes the actionable ones
//! and finally marks the whole portfolio to market.
//!
//! Ticks never overlap. A tick that arrives while another is still running
//! is skipped rather than queued, so a slow decision source cannot stack up
//! duplicate trades against stale state.

use crate::error::AppError;
use crate::services::portfolio::PortfolioManager;
use crate::types::{Decision, Portfolio, Position, PositionSignal, Trade, TradeAction};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

// =============================================================================
// Decision Source
// =============================================================================

/// Market snapshot handed to a decision source for one symbol.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketContext {
    pub symbol: String,
    pub price: f64,
    /// Recent prices, oldest first, ending with `price`
    pub history: Vec<f64>,
    pub positions: Vec<Position>,
    pub cash: f64,
    pub total_value: f64,
}

/// Produces trading decisions; implemented by the recommendation layer.
pub trait DecisionSource: Send + Sync {
    fn name(&self) -> &str;

    /// Decide what to do with `ctx.symbol`.
    fn decide<'a>(
        &'a self,
        ctx: &'a MarketContext,
    ) -> Pin<Box<dyn Future<Output = Result<Decision, AppError>> + Send + 'a>>;
}

/// Decision source backed by a fixed set of decisions, one per symbol.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDecisions {
    decisions: HashMap<String, Decision>,
}

impl ScriptedDecisions {
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            decisions: decisions
                .into_iter()
                .map(|d| (d.symbol.clone(), d))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

impl DecisionSource for ScriptedDecisions {
    fn name(&self) -> &str {
        "scripted"
    }

    fn decide<'a>(
        &'a self,
        ctx: &'a MarketContext,
    ) -> Pin<Box<dyn Future<Output = Result<Decision, AppError>> + Send + 'a>> {
        Box::pin(async move {
            self.decisions
                .get(&ctx.symbol)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("No decision for {}", ctx.symbol)))
        })
    }
}

// =============================================================================
// Reports
// =============================================================================

/// A decision received during a tick.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionReport {
    pub timestamp: i64,
    pub symbol: String,
    pub action: TradeAction,
    pub confidence: f64,
    pub reasoning: String,
}

/// A decision that did not turn into a trade.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRejection {
    pub symbol: String,
    pub action: TradeAction,
    pub reason: String,
}

/// Everything a completed tick did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub decisions: Vec<Decision>,
    pub trades: Vec<Trade>,
    pub rejections: Vec<TradeRejection>,
    pub signals: Vec<PositionSignal>,
    pub portfolio: Portfolio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    Disabled,
    InFlight,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TickOutcome {
    Completed(TickReport),
    Skipped { reason: SkipReason },
}

impl TickOutcome {
    pub fn report(&self) -> Option<&TickReport> {
        match self {
            TickOutcome::Completed(report) => Some(report),
            TickOutcome::Skipped { .. } => None,
        }
    }
}

// =============================================================================
// Agent
// =============================================================================

/// Agent tuning knobs.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Prices required for a symbol before decisions are requested
    pub min_history_points: usize,
    /// Prices retained per symbol
    pub max_history_points: usize,
    /// Decision reports retained
    pub report_limit: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            min_history_points: 20,
            max_history_points: 100,
            report_limit: 50,
        }
    }
}

/// Clears the in-flight flag when a tick ends, however it ends.
struct TickGuard<'a>(&'a AtomicBool);

impl<'a> TickGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TickGuard(flag))
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct TradingAgent {
    manager: Arc<PortfolioManager>,
    config: AgentConfig,
    /// Price history per symbol
    history: DashMap<String, VecDeque<f64>>,
    /// Recent decision reports, newest first
    reports: RwLock<VecDeque<DecisionReport>>,
    enabled: RwLock<bool>,
    in_flight: AtomicBool,
}

impl TradingAgent {
    pub fn new(manager: Arc<PortfolioManager>, config: AgentConfig) -> Self {
        Self {
            manager,
            config,
            history: DashMap::new(),
            reports: RwLock::new(VecDeque::new()),
            enabled: RwLock::new(true),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn manager(&self) -> &Arc<PortfolioManager> {
        &self.manager
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_enabled(&self, enabled: bool) {
        *self.enabled.write().unwrap_or_else(|e| e.into_inner()) = enabled;
        info!("Trading agent {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn is_ticking(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Recent decision reports, newest first.
    pub fn recent_reports(&self) -> Vec<DecisionReport> {
        self.reports
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Number of prices held for `symbol`.
    pub fn history_len(&self, symbol: &str) -> usize {
        self.history.get(symbol).map(|h| h.len()).unwrap_or(0)
    }

    /// Reset the portfolio and forget past decision reports.
    pub fn reset(&self) -> Portfolio {
        self.reports
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.manager.reset_portfolio()
    }

    fn record_price(&self, symbol: &str, price: f64) -> Vec<f64> {
        let mut entry = self.history.entry(symbol.to_string()).or_default();
        let history = entry.value_mut();
        history.push_back(price);
        while history.len() > self.config.max_history_points {
            history.pop_front();
        }
        history.iter().copied().collect()
    }

    fn record_reports(&self, new_reports: Vec<DecisionReport>) {
        let mut reports = self.reports.write().unwrap_or_else(|e| e.into_inner());
        for report in new_reports {
            reports.push_front(report);
        }
        reports.truncate(self.config.report_limit);
    }

    /// Run one decision pass and one mark-to-market pass.
    pub async fn tick(
        &self,
        prices: &HashMap<String, f64>,
        source: &dyn DecisionSource,
    ) -> TickOutcome {
        if !self.is_enabled() {
            return TickOutcome::Skipped {
                reason: SkipReason::Disabled,
            };
        }
        let Some(_guard) = TickGuard::acquire(&self.in_flight) else {
            debug!("Tick already in flight, skipping");
            return TickOutcome::Skipped {
                reason: SkipReason::InFlight,
            };
        };

        let mut symbols: Vec<&String> = prices.keys().collect();
        symbols.sort();

        let mut decisions = Vec::new();
        let mut trades = Vec::new();
        let mut rejections = Vec::new();
        let mut reports = Vec::new();

        for symbol in symbols {
            let price = prices[symbol];
            if !price.is_finite() || price <= 0.0 {
                warn!("Skipping {}: invalid price {}", symbol, price);
                continue;
            }

            let history = self.record_price(symbol, price);
            if history.len() < self.config.min_history_points {
                debug!(
                    "Skipping {}: {} of {} history points",
                    symbol,
                    history.len(),
                    self.config.min_history_points
                );
                continue;
            }

            let portfolio = self.manager.get_portfolio();
            let ctx = MarketContext {
                symbol: symbol.clone(),
                price,
                history,
                positions: portfolio.positions.clone(),
                cash: portfolio.cash,
                total_value: portfolio.total_value,
            };

            let decision = match source.decide(&ctx).await {
                Ok(decision) => decision,
                Err(e) => {
                    error!("{} failed to decide on {}: {}", source.name(), symbol, e);
                    continue;
                }
            };
            if &decision.symbol != symbol || !decision.confidence.is_finite() {
                warn!(
                    "Discarding malformed decision from {} for {}",
                    source.name(),
                    symbol
                );
                continue;
            }

            reports.push(DecisionReport {
                timestamp: chrono::Utc::now().timestamp_millis(),
                symbol: symbol.clone(),
                action: decision.action,
                confidence: decision.confidence,
                reasoning: decision.reasoning.clone(),
            });

            let quantity = match decision.action {
                TradeAction::Hold => None,
                TradeAction::Buy => self
                    .manager
                    .calculate_position_size(&decision, price)
                    .ok()
                    .filter(|&q| q > 0.0),
                TradeAction::Sell => portfolio.position(symbol).map(|p| p.quantity),
            };

            if let Some(quantity) = quantity {
                match self.manager.execute_trade(&decision, price, quantity) {
                    Ok(Some(trade)) => trades.push(trade),
                    Ok(None) => {}
                    Err(e) => rejections.push(TradeRejection {
                        symbol: symbol.clone(),
                        action: decision.action,
                        reason: e.to_string(),
                    }),
                }
            }

            decisions.push(decision);
        }

        let signals = self.manager.update_positions(prices);
        self.record_reports(reports);

        info!(
            "Tick complete: {} decisions, {} trades, {} signals",
            decisions.len(),
            trades.len(),
            signals.len()
        );

        TickOutcome::Completed(TickReport {
            decisions,
            trades,
            rejections,
            signals,
            portfolio: self.manager.get_portfolio(),
        })
    }
}
