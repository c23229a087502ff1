//! Trailing stop ledger: highest price seen per open position.

use crate::types::Position;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrailingStops {
    peaks: HashMap<String, f64>,
}

impl TrailingStops {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted peaks, dropping entries without an open position.
    pub fn restore(peaks: HashMap<String, f64>, positions: &[Position]) -> Self {
        let mut ledger = Self { peaks };
        ledger.prune(positions);
        ledger
    }

    /// Start tracking `symbol` from `price`, replacing any earlier peak.
    pub fn seed(&mut self, symbol: &str, price: f64) {
        self.peaks.insert(symbol.to_string(), price);
    }

    pub fn peak(&self, symbol: &str) -> Option<f64> {
        self.peaks.get(symbol).copied()
    }

    /// Record `price` if it beats the current peak (or `fallback` when the
    /// symbol is untracked). Returns the new peak when it moved.
    pub fn ratchet(&mut self, symbol: &str, price: f64, fallback: f64) -> Option<f64> {
        let peak = self.peak(symbol).unwrap_or(fallback);
        if price > peak {
            self.peaks.insert(symbol.to_string(), price);
            Some(price)
        } else {
            None
        }
    }

    pub fn remove(&mut self, symbol: &str) -> Option<f64> {
        self.peaks.remove(symbol)
    }

    /// Drop peaks for symbols that no longer have a position.
    pub fn prune(&mut self, positions: &[Position]) {
        self.peaks
            .retain(|symbol, _| positions.iter().any(|p| &p.symbol == symbol));
    }

    pub fn clear(&mut self) {
        self.peaks.clear();
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn as_map(&self) -> &HashMap<String, f64> {
        &self.peaks
    }
}
