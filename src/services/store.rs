//! Portfolio persistence boundary.
//!
//! The engine only needs a durable key-value medium with two operations,
//! `load` and `save`. The typed helpers on [`PortfolioStore`] encode the
//! records the engine keeps:
//! - `trading-portfolio`: the portfolio snapshot (JSON)
//! - `trading-initial-cash`: the initial cash baseline (JSON number)
//! - `trading-trailing-stops`: the trailing stop peaks (JSON object)

use crate::types::Portfolio;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

pub const PORTFOLIO_KEY: &str = "trading-portfolio";
pub const INITIAL_CASH_KEY: &str = "trading-initial-cash";
pub const TRAILING_STOPS_KEY: &str = "trading-trailing-stops";

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt record {key}: {message}")]
    Corrupt { key: String, message: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

fn decode<T: serde::de::DeserializeOwned>(key: &str, raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn encode<T: serde::Serialize>(key: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Durable key-value storage for the engine's state.
///
/// `save` overwrites, so repeating it with the same snapshot is harmless.
pub trait PortfolioStore: Send + Sync {
    /// Read the raw value stored under `key`.
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrite the value stored under `key`.
    fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn load_portfolio(&self) -> Result<Option<Portfolio>, StoreError> {
        self.load(PORTFOLIO_KEY)?
            .map(|raw| decode(PORTFOLIO_KEY, &raw))
            .transpose()
    }

    fn save_portfolio(&self, portfolio: &Portfolio) -> Result<(), StoreError> {
        self.save(PORTFOLIO_KEY, &encode(PORTFOLIO_KEY, portfolio)?)
    }

    fn load_initial_cash(&self) -> Result<Option<f64>, StoreError> {
        self.load(INITIAL_CASH_KEY)?
            .map(|raw| decode(INITIAL_CASH_KEY, &raw))
            .transpose()
    }

    fn save_initial_cash(&self, amount: f64) -> Result<(), StoreError> {
        self.save(INITIAL_CASH_KEY, &encode(INITIAL_CASH_KEY, &amount)?)
    }

    fn load_trailing_stops(&self) -> Result<Option<HashMap<String, f64>>, StoreError> {
        self.load(TRAILING_STOPS_KEY)?
            .map(|raw| decode(TRAILING_STOPS_KEY, &raw))
            .transpose()
    }

    fn save_trailing_stops(&self, peaks: &HashMap<String, f64>) -> Result<(), StoreError> {
        self.save(TRAILING_STOPS_KEY, &encode(TRAILING_STOPS_KEY, peaks)?)
    }
}

/// In-process store, used for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PortfolioStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.load("missing").unwrap(), None);

        store.save("k", "v1").unwrap();
        store.save("k", "v2").unwrap();
        assert_eq!(store.load("k").unwrap(), Some("v2".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_typed_helpers() {
        let store = MemoryStore::new();
        assert!(store.load_portfolio().unwrap().is_none());
        assert!(store.load_initial_cash().unwrap().is_none());

        let portfolio = Portfolio::new(2_500.0);
        store.save_portfolio(&portfolio).unwrap();
        store.save_initial_cash(2_500.0).unwrap();

        assert_eq!(store.load_portfolio().unwrap(), Some(portfolio));
        assert_eq!(store.load_initial_cash().unwrap(), Some(2_500.0));
    }

    #[test]
    fn test_corrupt_record() {
        let store = MemoryStore::new();
        store.save(PORTFOLIO_KEY, "{not json").unwrap();

        let err = store.load_portfolio().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { ref key, .. } if key == PORTFOLIO_KEY));
    }
}
