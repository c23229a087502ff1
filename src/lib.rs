//! Wraith - simulated trading agent with a portfolio and risk engine

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod types;

use config::Config;
use services::{PortfolioManager, TradingAgent};
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub manager: Arc<PortfolioManager>,
    pub agent: Arc<TradingAgent>,
}

impl AppState {
    pub fn new(config: Config, manager: Arc<PortfolioManager>) -> Self {
        let agent = Arc::new(TradingAgent::new(manager.clone(), config.agent.clone()));
        Self {
            config: Arc::new(config),
            manager,
            agent,
        }
    }
}

// Re-export commonly used types
pub use types::*;
