use crate::services::agent::AgentConfig;
use crate::types::{Strategy, StrategyPreset};
use std::env;
use tracing::warn;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite database file for portfolio state.
    pub database_path: String,
    /// Starting cash when no saved portfolio exists.
    pub initial_balance: f64,
    /// Preset the strategy starts from.
    pub strategy_preset: StrategyPreset,
    /// Tick runner settings.
    pub agent: AgentConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AgentConfig::default();

        let strategy_preset = match lookup("STRATEGY_PRESET") {
            Some(name) => name.parse().unwrap_or_else(|e| {
                warn!("{}, using moderate", e);
                StrategyPreset::Moderate
            }),
            None => StrategyPreset::Moderate,
        };

        let initial_balance = lookup("INITIAL_BALANCE")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(10_000.0);

        Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
            database_path: lookup("DATABASE_PATH").unwrap_or_else(|| "data/wraith.db".to_string()),
            initial_balance,
            strategy_preset,
            agent: AgentConfig {
                min_history_points: lookup("MIN_HISTORY_POINTS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.min_history_points),
                max_history_points: lookup("MAX_HISTORY_POINTS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.max_history_points),
                report_limit: lookup("REPORT_HISTORY_LIMIT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.report_limit),
            },
        }
    }

    /// The strategy the engine starts with.
    pub fn strategy(&self) -> Strategy {
        self.strategy_preset.strategy()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3001);
        assert_eq!(config.database_path, "data/wraith.db");
        assert_eq!(config.initial_balance, 10_000.0);
        assert_eq!(config.strategy_preset, StrategyPreset::Moderate);
        assert_eq!(config.agent.min_history_points, 20);
        assert_eq!(config.agent.max_history_points, 100);
        assert_eq!(config.agent.report_limit, 50);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("INITIAL_BALANCE", "2500"),
            ("STRATEGY_PRESET", "Aggressive"),
            ("MIN_HISTORY_POINTS", "5"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.initial_balance, 2_500.0);
        assert_eq!(config.strategy().name, "Aggressive");
        assert_eq!(config.agent.min_history_points, 5);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = config_from(&[
            ("PORT", "not-a-port"),
            ("INITIAL_BALANCE", "-50"),
            ("STRATEGY_PRESET", "reckless"),
        ]);
        assert_eq!(config.port, 3001);
        assert_eq!(config.initial_balance, 10_000.0);
        assert_eq!(config.strategy_preset, StrategyPreset::Moderate);
    }
}
