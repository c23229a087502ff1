//! Mark-to-market: revalue open positions and raise advisory signals.

use super::trailing::TrailingStops;
use crate::types::{Portfolio, PositionSignal, Strategy};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Mark every position that has a fresh price, advance trailing stops and
/// recompute portfolio totals against `initial_cash`.
///
/// Positions without a fresh price keep their last mark and still count
/// toward total value.
pub fn remark(
    portfolio: &mut Portfolio,
    trailing: &mut TrailingStops,
    strategy: &Strategy,
    prices: &HashMap<String, f64>,
    initial_cash: f64,
) -> Vec<PositionSignal> {
    let mut signals = Vec::new();

    for symbol in prices.keys() {
        if !portfolio.has_position(symbol) {
            debug!("Ignoring price for {}: no open position", symbol);
        }
    }

    for position in portfolio.positions.iter_mut() {
        let Some(&price) = prices.get(&position.symbol) else {
            continue;
        };
        if !price.is_finite() || price <= 0.0 {
            warn!("Ignoring invalid price {} for {}", price, position.symbol);
            continue;
        }

        position.mark(price);

        if strategy.use_trailing_stop {
            if let Some(peak) = trailing.ratchet(&position.symbol, price, position.entry_price) {
                let candidate = peak * (1.0 - strategy.trailing_stop_percent / 100.0);
                let raised = position.stop_loss.map_or(true, |stop| candidate > stop);
                if raised {
                    position.stop_loss = Some(candidate);
                    debug!(
                        "Trailing stop for {} raised to {:.4} (peak {})",
                        position.symbol, candidate, peak
                    );
                    signals.push(PositionSignal::TrailingStopRaised {
                        symbol: position.symbol.clone(),
                        peak,
                        stop_loss: candidate,
                    });
                }
            }
        }

        if strategy.use_scalping {
            let profit_percent = position.profit_percent();
            if profit_percent >= strategy.scalping_target_percent {
                info!(
                    "Scalping target reached for {}: {:.2}%",
                    position.symbol, profit_percent
                );
                signals.push(PositionSignal::ScalpingTargetReached {
                    symbol: position.symbol.clone(),
                    price,
                    profit_percent,
                });
            }
        }

        if let Some(stop_loss) = position.stop_loss.filter(|&s| price <= s) {
            info!("Stop loss hit for {} at {}", position.symbol, price);
            signals.push(PositionSignal::StopLossHit {
                symbol: position.symbol.clone(),
                price,
                stop_loss,
            });
        }

        if let Some(take_profit) = position.take_profit.filter(|&t| price >= t) {
            info!("Take profit hit for {} at {}", position.symbol, price);
            signals.push(PositionSignal::TakeProfitHit {
                symbol: position.symbol.clone(),
                price,
                take_profit,
            });
        }
    }

    portfolio.recalculate(initial_cash);
    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Decision, Position, TradeAction};

    fn setup(entry: f64) -> (Portfolio, TrailingStops) {
        let decision = Decision::new("BTC", TradeAction::Buy, 0.9);
        let mut portfolio = Portfolio::new(10_000.0);
        portfolio.cash -= entry * 2.0;
        portfolio.positions.push(Position::open(&decision, 2.0, entry, 10));
        let mut trailing = TrailingStops::new();
        trailing.seed("BTC", entry);
        (portfolio, trailing)
    }

    fn prices(price: f64) -> HashMap<String, f64> {
        HashMap::from([("BTC".to_string(), price)])
    }

    #[test]
    fn test_remark_updates_totals() {
        let (mut portfolio, mut trailing) = setup(100.0);
        let mut strategy = Strategy::default();
        strategy.use_trailing_stop = false;

        let signals = remark(&mut portfolio, &mut trailing, &strategy, &prices(150.0), 10_000.0);

        assert!(signals.is_empty());
        let position = &portfolio.positions[0];
        assert_eq!(position.current_price, 150.0);
        assert_eq!(position.unrealized_pnl, 100.0);
        assert_eq!(portfolio.total_value, 10_100.0);
        assert!((portfolio.total_return - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_trailing_stop_monotonic() {
        let (mut portfolio, mut trailing) = setup(100.0);
        let strategy = Strategy::default();
        let mut last_stop = 0.0;

        for price in [101.0, 102.5, 104.0, 110.0] {
            let signals = remark(&mut portfolio, &mut trailing, &strategy, &prices(price), 10_000.0);
            let stop = portfolio.positions[0].stop_loss.unwrap();
            assert!(stop >= last_stop);
            assert!((stop - price * 0.97).abs() < 1e-9);
            assert!(matches!(signals[0], PositionSignal::TrailingStopRaised { .. }));
            last_stop = stop;
        }

        let signals = remark(&mut portfolio, &mut trailing, &strategy, &prices(108.0), 10_000.0);
        assert!(signals.is_empty());
        assert_eq!(portfolio.positions[0].stop_loss, Some(last_stop));
        assert_eq!(trailing.peak("BTC"), Some(110.0));
    }

    #[test]
    fn test_trailing_stop_never_loosens_decision_stop() {
        let (mut portfolio, mut trailing) = setup(100.0);
        portfolio.positions[0].stop_loss = Some(99.5);
        let strategy = Strategy::default();

        // New peak, but 101 * 0.97 is below the existing stop.
        let signals = remark(&mut portfolio, &mut trailing, &strategy, &prices(101.0), 10_000.0);
        assert!(signals.is_empty());
        assert_eq!(portfolio.positions[0].stop_loss, Some(99.5));
    }

    #[test]
    fn test_stop_loss_and_take_profit_signals() {
        let (mut portfolio, mut trailing) = setup(100.0);
        portfolio.positions[0].stop_loss = Some(95.0);
        portfolio.positions[0].take_profit = Some(120.0);
        let mut strategy = Strategy::default();
        strategy.use_trailing_stop = false;

        let signals = remark(&mut portfolio, &mut trailing, &strategy, &prices(94.0), 10_000.0);
        assert_eq!(
            signals,
            vec![PositionSignal::StopLossHit {
                symbol: "BTC".to_string(),
                price: 94.0,
                stop_loss: 95.0,
            }]
        );

        let signals = remark(&mut portfolio, &mut trailing, &strategy, &prices(120.0), 10_000.0);
        assert!(matches!(signals[..], [PositionSignal::TakeProfitHit { take_profit, .. }] if take_profit == 120.0));

        // Advisory only: nothing was sold.
        assert_eq!(portfolio.positions.len(), 1);
    }

    #[test]
    fn test_scalping_target() {
        let (mut portfolio, mut trailing) = setup(100.0);
        let mut strategy = Strategy::default();
        strategy.use_trailing_stop = false;
        strategy.use_scalping = true;
        strategy.scalping_target_percent = 1.5;

        let signals = remark(&mut portfolio, &mut trailing, &strategy, &prices(101.0), 10_000.0);
        assert!(signals.is_empty());

        let signals = remark(&mut portfolio, &mut trailing, &strategy, &prices(102.0), 10_000.0);
        assert!(matches!(
            signals[..],
            [PositionSignal::ScalpingTargetReached { profit_percent, .. }] if (profit_percent - 2.0).abs() < 1e-9
        ));
    }

    #[test]
    fn test_invalid_and_missing_prices_keep_last_mark() {
        let (mut portfolio, mut trailing) = setup(100.0);
        let strategy = Strategy::default();

        let mut bad = prices(-3.0);
        bad.insert("DOGE".to_string(), 0.25);
        let signals = remark(&mut portfolio, &mut trailing, &strategy, &bad, 10_000.0);

        assert!(signals.is_empty());
        assert_eq!(portfolio.positions[0].current_price, 100.0);
        assert_eq!(portfolio.total_value, 10_000.0);

        remark(&mut portfolio, &mut trailing, &strategy, &HashMap::new(), 10_000.0);
        assert_eq!(portfolio.total_value, 10_000.0);
    }
}
