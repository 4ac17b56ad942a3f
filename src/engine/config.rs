//! Engine configuration options.

use crate::types::{Leverage, Money, UserId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// A user registered when the engine is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedUser {
    pub user_id: UserId,
    pub balance: Money,
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Starting balance for users registered without an explicit amount.
    pub default_balance: Money,
    /// Optional ceiling on position leverage. `None` accepts any leverage >= 1.
    pub max_leverage: Option<Leverage>,
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Users created at startup.
    pub seed_users: Vec<SeedUser>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_balance: Money::new(dec!(10000)),
            max_leverage: None,
            max_events: 100_000,
            seed_users: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn with_seed_user(mut self, user_id: UserId, balance: Money) -> Self {
        self.seed_users.push(SeedUser { user_id, balance });
        self
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        // serde builds Leverage without its constructor, so recheck the floor
        if let Some(max) = self.max_leverage {
            if max.value() < Decimal::ONE {
                return Err(ConfigError::InvalidLeverage(max.value()));
            }
        }

        if self.default_balance.is_negative() {
            return Err(ConfigError::InvalidBalance(self.default_balance));
        }

        if self.max_events == 0 {
            return Err(ConfigError::InvalidEventCapacity);
        }

        for seed in &self.seed_users {
            if seed.balance.is_negative() {
                return Err(ConfigError::InvalidBalance(seed.balance));
            }
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Config could not be parsed: {0}")]
    Parse(String),

    #[error("Max leverage must be at least 1, got {0}")]
    InvalidLeverage(Decimal),

    #[error("Balances must not be negative, got {0}")]
    InvalidBalance(Money),

    #[error("Event log capacity must be positive")]
    InvalidEventCapacity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_balance.value(), dec!(10000));
        assert_eq!(config.max_leverage, None);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{"max_events": 50}"#).unwrap();
        assert_eq!(config.max_events, 50);
        assert_eq!(config.default_balance.value(), dec!(10000));
    }

    #[test]
    fn json_seed_users() {
        let raw = r#"{
            "default_balance": "5000",
            "seed_users": [{"user_id": 1, "balance": "10000"}]
        }"#;
        let config = EngineConfig::from_json(raw).unwrap();
        assert_eq!(config.default_balance.value(), dec!(5000));
        assert_eq!(config.seed_users.len(), 1);
        assert_eq!(config.seed_users[0].user_id, UserId(1));
    }

    #[test]
    fn json_leverage_ceiling() {
        let config = EngineConfig::from_json(r#"{"max_leverage": "50"}"#).unwrap();
        assert_eq!(config.max_leverage, Leverage::new(dec!(50)));
    }

    #[test]
    fn rejects_sub_one_leverage() {
        let result = EngineConfig::from_json(r#"{"max_leverage": "0.5"}"#);
        assert_eq!(result.unwrap_err(), ConfigError::InvalidLeverage(dec!(0.5)));
    }

    #[test]
    fn rejects_negative_balance() {
        let config = EngineConfig::default().with_seed_user(UserId(1), Money::new(dec!(-1)));
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBalance(_))));
    }

    #[test]
    fn rejects_zero_capacity() {
        let mut config = EngineConfig::default();
        config.max_events = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidEventCapacity));
    }

    #[test]
    fn rejects_bad_json() {
        assert!(matches!(EngineConfig::from_json("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn config_serialization() {
        let config = EngineConfig::default().with_seed_user(UserId(3), Money::new(dec!(42)));
        let json = serde_json::to_string(&config).unwrap();
        let back = EngineConfig::from_json(&json).unwrap();
        assert_eq!(back.seed_users, config.seed_users);
    }
}
