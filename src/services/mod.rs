pub mod agent;
pub mod portfolio;
pub mod sqlite_store;
pub mod store;

pub use agent::{
    AgentConfig, DecisionReport, DecisionSource, MarketContext, ScriptedDecisions, SkipReason,
    TickOutcome, TickReport, TradingAgent,
};
pub use portfolio::{GateDenial, PortfolioManager, TradingError};
pub use sqlite_store::SqliteStore;
pub use store::{MemoryStore, PortfolioStore, StoreError};
