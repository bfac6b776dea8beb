//! Strategy configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::domain::OrderKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Everything the strategy core needs to evaluate a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub symbol: String,
    /// Fraction of cash committed when sizing a position, in `(0, 1]`.
    pub cash_at_risk: f64,
    /// Calendar days of news ending today that feed each tick.
    pub news_lookback_days: u32,
    /// Trades fire only when confidence is strictly above this.
    pub confidence_threshold: f64,
    pub order_type: OrderKind,
    /// Bracket take-profit distance as a fraction of last price.
    pub take_profit_pct: f64,
    /// Bracket stop-loss distance as a fraction of last price.
    pub stop_loss_pct: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            symbol: "SPY".into(),
            cash_at_risk: 0.5,
            news_lookback_days: 3,
            confidence_threshold: 0.999,
            order_type: OrderKind::Market,
            take_profit_pct: 0.20,
            stop_loss_pct: 0.05,
        }
    }
}

impl StrategyConfig {
    pub fn for_symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(invalid("symbol", "must not be empty"));
        }
        if !(self.cash_at_risk > 0.0 && self.cash_at_risk <= 1.0) {
            return Err(invalid(
                "cash_at_risk",
                format!("must be in (0, 1], got {}", self.cash_at_risk),
            ));
        }
        if self.news_lookback_days == 0 {
            return Err(invalid("news_lookback_days", "must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.confidence_threshold) {
            return Err(invalid(
                "confidence_threshold",
                format!("must be in [0, 1), got {}", self.confidence_threshold),
            ));
        }
        if !(self.take_profit_pct > 0.0 && self.take_profit_pct < 1.0) {
            return Err(invalid(
                "take_profit_pct",
                format!("must be in (0, 1), got {}", self.take_profit_pct),
            ));
        }
        if !(self.stop_loss_pct > 0.0 && self.stop_loss_pct < 1.0) {
            return Err(invalid(
                "stop_loss_pct",
                format!("must be in (0, 1), got {}", self.stop_loss_pct),
            ));
        }
        Ok(())
    }
}
