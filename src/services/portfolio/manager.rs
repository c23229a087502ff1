//! Portfolio manager: the engine's public contract.

use super::trailing::TrailingStops;
use super::{executor, gate, mark, sizer, GateDenial, TradingError};
use crate::services::store::PortfolioStore;
use crate::types::{Decision, Portfolio, PositionSignal, Strategy, Trade};
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, error, info, warn};

/// Baseline used when no valid initial balance is supplied.
pub const DEFAULT_INITIAL_CASH: f64 = 10_000.0;

/// Source of the current local time for calendar rules.
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Mutable engine state, always updated under one lock.
struct Book {
    portfolio: Portfolio,
    trailing: TrailingStops,
    initial_cash: f64,
}

/// Owns the portfolio, the active strategy and the trailing stop ledger.
pub struct PortfolioManager {
    strategy: RwLock<Arc<Strategy>>,
    book: Mutex<Book>,
    store: Arc<dyn PortfolioStore>,
    clock: Clock,
    store_healthy: AtomicBool,
}

impl PortfolioManager {
    /// Build a manager, restoring any state found in `store`.
    ///
    /// When either the saved portfolio or the saved baseline is missing (or
    /// unreadable), a fresh portfolio is created at `initial_cash`.
    pub fn new(strategy: Strategy, store: Arc<dyn PortfolioStore>, initial_cash: f64) -> Self {
        let initial_cash = if initial_cash.is_finite() && initial_cash > 0.0 {
            initial_cash
        } else {
            warn!(
                "Invalid initial balance {}, using {}",
                initial_cash, DEFAULT_INITIAL_CASH
            );
            DEFAULT_INITIAL_CASH
        };

        let manager = Self {
            strategy: RwLock::new(Arc::new(strategy)),
            book: Mutex::new(Book {
                portfolio: Portfolio::new(initial_cash),
                trailing: TrailingStops::new(),
                initial_cash,
            }),
            store,
            clock: Arc::new(Local::now),
            store_healthy: AtomicBool::new(true),
        };
        manager.restore(initial_cash);
        manager
    }

    /// Replace the clock used for the weekend rule.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Local> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn restore(&self, initial_cash: f64) {
        let saved = self
            .store
            .load_portfolio()
            .and_then(|portfolio| Ok((portfolio, self.store.load_initial_cash()?)));

        let mut book = self.lock();
        match saved {
            Ok((Some(portfolio), Some(cash))) if cash > 0.0 => {
                let peaks = match self.store.load_trailing_stops() {
                    Ok(peaks) => peaks.unwrap_or_default(),
                    Err(e) => {
                        warn!("Failed to load trailing stops, starting empty: {}", e);
                        HashMap::new()
                    }
                };
                book.trailing = TrailingStops::restore(peaks, &portfolio.positions);
                book.portfolio = portfolio;
                book.initial_cash = cash;
                info!(
                    "Restored portfolio: cash {:.2}, {} positions, {} trades",
                    book.portfolio.cash,
                    book.portfolio.positions.len(),
                    book.portfolio.trades.len()
                );
                return;
            }
            Ok(_) => {
                info!("No saved portfolio, starting with {:.2}", initial_cash);
            }
            Err(e) => {
                warn!("Failed to load portfolio, starting fresh: {}", e);
            }
        }

        book.portfolio = Portfolio::new(initial_cash);
        book.trailing.clear();
        book.initial_cash = initial_cash;
        if let Err(e) = self.store.save_initial_cash(initial_cash) {
            error!("Failed to save initial balance: {}", e);
            self.store_healthy.store(false, Ordering::Relaxed);
        }
        self.persist(&book);
    }

    fn lock(&self) -> MutexGuard<'_, Book> {
        self.book.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Save the snapshot and trailing peaks. Failures are logged; the
    /// in-memory state stays authoritative until the next successful save.
    fn persist(&self, book: &Book) {
        let result = self
            .store
            .save_portfolio(&book.portfolio)
            .and_then(|_| self.store.save_trailing_stops(book.trailing.as_map()));

        match result {
            Ok(()) => self.store_healthy.store(true, Ordering::Relaxed),
            Err(e) => {
                error!("Failed to persist portfolio: {}", e);
                self.store_healthy.store(false, Ordering::Relaxed);
            }
        }
    }

    /// Whether the most recent save succeeded.
    pub fn is_store_healthy(&self) -> bool {
        self.store_healthy.load(Ordering::Relaxed)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Copy of the current portfolio.
    pub fn get_portfolio(&self) -> Portfolio {
        self.lock().portfolio.clone()
    }

    /// The active strategy.
    pub fn strategy(&self) -> Arc<Strategy> {
        self.strategy
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn get_initial_balance(&self) -> f64 {
        self.lock().initial_cash
    }

    /// Highest price tracked for `symbol`'s trailing stop.
    pub fn trailing_peak(&self, symbol: &str) -> Option<f64> {
        self.lock().trailing.peak(symbol)
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Swap the active strategy. Operations already holding the previous
    /// strategy finish with it.
    pub fn set_strategy(&self, strategy: Strategy) {
        info!("Strategy set to {}", strategy.name);
        *self.strategy.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(strategy);
    }

    /// Change the return baseline and reset target. Trade history is untouched.
    pub fn set_initial_balance(&self, amount: f64) -> Result<(), TradingError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(TradingError::InvalidAmount(amount));
        }

        let mut book = self.lock();
        book.initial_cash = amount;
        book.portfolio.recalculate(amount);
        if let Err(e) = self.store.save_initial_cash(amount) {
            error!("Failed to save initial balance: {}", e);
            self.store_healthy.store(false, Ordering::Relaxed);
        }
        self.persist(&book);

        info!("Initial balance set to {:.2}", amount);
        Ok(())
    }

    // =========================================================================
    // Trading
    // =========================================================================

    /// Gate check with the reason for a refusal.
    pub fn check_open_position(&self, decision: &Decision) -> Result<(), GateDenial> {
        let strategy = self.strategy();
        let now = (self.clock)();
        let book = self.lock();
        gate::check(decision, &book.portfolio, &strategy, &now)
    }

    pub fn can_open_position(&self, decision: &Decision) -> bool {
        self.check_open_position(decision).is_ok()
    }

    /// Quantity to trade for `decision` at `price`.
    pub fn calculate_position_size(&self, decision: &Decision, price: f64) -> Result<f64, TradingError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(TradingError::InvalidPrice(price));
        }
        let strategy = self.strategy();
        let book = self.lock();
        Ok(sizer::size(decision, price, &book.portfolio, &strategy))
    }

    /// Apply a BUY or SELL. HOLD returns `Ok(None)`; rejections leave state
    /// unchanged.
    pub fn execute_trade(
        &self,
        decision: &Decision,
        price: f64,
        quantity: f64,
    ) -> Result<Option<Trade>, TradingError> {
        let strategy = self.strategy();
        let now = (self.clock)();
        let mut book = self.lock();
        let Book {
            portfolio,
            trailing,
            initial_cash,
        } = &mut *book;

        let result = executor::execute(portfolio, trailing, &strategy, decision, price, quantity, &now);
        match &result {
            Ok(Some(_)) => {
                portfolio.recalculate(*initial_cash);
                self.persist(&book);
            }
            Ok(None) => {}
            Err(e) => debug!("Trade for {} rejected: {}", decision.symbol, e),
        }
        result
    }

    /// Mark open positions to `prices` and return the signals raised.
    pub fn update_positions(&self, prices: &HashMap<String, f64>) -> Vec<PositionSignal> {
        let strategy = self.strategy();
        let mut book = self.lock();
        let Book {
            portfolio,
            trailing,
            initial_cash,
        } = &mut *book;

        let signals = mark::remark(portfolio, trailing, &strategy, prices, *initial_cash);
        self.persist(&book);
        signals
    }

    /// Discard positions, trades and trailing stops and restore the baseline cash.
    pub fn reset_portfolio(&self) -> Portfolio {
        let mut book = self.lock();
        book.portfolio = Portfolio::new(book.initial_cash);
        book.trailing.clear();
        self.persist(&book);

        info!("Reset portfolio to {:.2}", book.initial_cash);
        book.portfolio.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::{MemoryStore, StoreError};
    use crate::types::TradeAction;
    use chrono::TimeZone;

    struct FailingStore;

    impl PortfolioStore for FailingStore {
        fn load(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("disk on fire".to_string()))
        }

        fn save(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk on fire".to_string()))
        }
    }

    fn manager() -> PortfolioManager {
        PortfolioManager::new(Strategy::default(), Arc::new(MemoryStore::new()), 10_000.0)
    }

    fn buy(symbol: &str, confidence: f64) -> Decision {
        Decision::new(symbol, TradeAction::Buy, confidence)
    }

    #[test]
    fn test_fresh_manager_saves_baseline() {
        let store = Arc::new(MemoryStore::new());
        let manager = PortfolioManager::new(Strategy::default(), store.clone(), 5_000.0);

        assert_eq!(manager.get_initial_balance(), 5_000.0);
        assert_eq!(manager.get_portfolio().cash, 5_000.0);
        assert_eq!(store.load_initial_cash().unwrap(), Some(5_000.0));
        assert!(store.load_portfolio().unwrap().is_some());
    }

    #[test]
    fn test_invalid_initial_cash_uses_default() {
        let manager = PortfolioManager::new(Strategy::default(), Arc::new(MemoryStore::new()), -1.0);
        assert_eq!(manager.get_initial_balance(), DEFAULT_INITIAL_CASH);
    }

    #[test]
    fn test_restores_saved_state() {
        let store = Arc::new(MemoryStore::new());
        {
            let manager = PortfolioManager::new(Strategy::default(), store.clone(), 10_000.0);
            manager.execute_trade(&buy("BTC", 0.9), 100.0, 2.0).unwrap();
        }

        // A different default baseline does not override the saved one.
        let manager = PortfolioManager::new(Strategy::default(), store, 1.0);
        let portfolio = manager.get_portfolio();
        assert_eq!(manager.get_initial_balance(), 10_000.0);
        assert_eq!(portfolio.cash, 9_800.0);
        assert_eq!(portfolio.positions.len(), 1);
        assert_eq!(manager.trailing_peak("BTC"), Some(100.0));
    }

    #[test]
    fn test_missing_baseline_starts_fresh() {
        let store = Arc::new(MemoryStore::new());
        let mut stale = Portfolio::new(500.0);
        stale.cash = 12.0;
        store.save_portfolio(&stale).unwrap();

        let manager = PortfolioManager::new(Strategy::default(), store, 10_000.0);
        assert_eq!(manager.get_portfolio(), Portfolio::new(10_000.0));
    }

    #[test]
    fn test_load_failure_falls_back() {
        let manager = PortfolioManager::new(Strategy::default(), Arc::new(FailingStore), 10_000.0);
        assert_eq!(manager.get_portfolio(), Portfolio::new(10_000.0));
        assert!(!manager.is_store_healthy());
    }

    #[test]
    fn test_save_failure_keeps_memory_state() {
        let manager = PortfolioManager::new(Strategy::default(), Arc::new(FailingStore), 10_000.0);
        let trade = manager.execute_trade(&buy("BTC", 0.9), 100.0, 2.0).unwrap();

        assert!(trade.is_some());
        assert_eq!(manager.get_portfolio().cash, 9_800.0);
        assert!(!manager.is_store_healthy());
    }

    #[test]
    fn test_weekend_clock() {
        let mut strategy = Strategy::default();
        strategy.use_market_timing = true;
        strategy.avoid_weekends = true;

        let saturday = Local.with_ymd_and_hms(2024, 1, 13, 12, 0, 0).unwrap();
        let manager = PortfolioManager::new(strategy, Arc::new(MemoryStore::new()), 10_000.0)
            .with_clock(move || saturday);

        assert_eq!(manager.check_open_position(&buy("BTC", 0.9)), Err(GateDenial::Weekend));
        let err = manager.execute_trade(&buy("BTC", 0.9), 100.0, 1.0).unwrap_err();
        assert_eq!(err, TradingError::GateDenied(GateDenial::Weekend));
    }

    #[test]
    fn test_set_strategy_applies_to_next_call() {
        let manager = manager();
        assert!(!manager.can_open_position(&buy("BTC", 0.6)));

        let mut loose = Strategy::default();
        loose.min_confidence = 0.5;
        manager.set_strategy(loose.clone());

        assert_eq!(*manager.strategy(), loose);
        assert!(manager.can_open_position(&buy("BTC", 0.6)));
    }

    #[test]
    fn test_set_initial_balance() {
        let manager = manager();
        manager.execute_trade(&buy("BTC", 0.9), 100.0, 2.0).unwrap();
        let trades_before = manager.get_portfolio().trades;

        manager.set_initial_balance(5_000.0).unwrap();
        let portfolio = manager.get_portfolio();
        assert_eq!(manager.get_initial_balance(), 5_000.0);
        assert_eq!(portfolio.trades, trades_before);
        assert!((portfolio.total_return - 100.0).abs() < 1e-9);

        assert_eq!(
            manager.set_initial_balance(0.0),
            Err(TradingError::InvalidAmount(0.0))
        );

        assert_eq!(manager.reset_portfolio().cash, 5_000.0);
    }

    #[test]
    fn test_calculate_position_size() {
        let manager = manager();
        assert_eq!(manager.calculate_position_size(&buy("BTC", 0.9), 100.0), Ok(2.0));
        assert_eq!(
            manager.calculate_position_size(&buy("BTC", 0.9), 0.0),
            Err(TradingError::InvalidPrice(0.0))
        );
        let hold = Decision::new("BTC", TradeAction::Hold, 0.9);
        assert_eq!(manager.calculate_position_size(&hold, 100.0), Ok(0.0));
    }

    #[test]
    fn test_update_positions_persists() {
        let store = Arc::new(MemoryStore::new());
        let manager = PortfolioManager::new(Strategy::default(), store.clone(), 10_000.0);
        manager.execute_trade(&buy("BTC", 0.9), 100.0, 2.0).unwrap();

        let prices = HashMap::from([("BTC".to_string(), 110.0)]);
        let signals = manager.update_positions(&prices);

        assert_eq!(signals.len(), 1);
        let saved = store.load_portfolio().unwrap().unwrap();
        assert_eq!(saved.total_value, 10_020.0);
        assert_eq!(manager.trailing_peak("BTC"), Some(110.0));
    }

    #[test]
    fn test_reset_clears_everything() {
        let manager = manager();
        manager.execute_trade(&buy("BTC", 0.9), 100.0, 2.0).unwrap();
        manager.update_positions(&HashMap::from([("BTC".to_string(), 150.0)]));

        let portfolio = manager.reset_portfolio();
        assert_eq!(portfolio, Portfolio::new(10_000.0));
        assert_eq!(manager.trailing_peak("BTC"), None);
        assert_eq!(manager.get_portfolio().total_return, 0.0);
    }
}
