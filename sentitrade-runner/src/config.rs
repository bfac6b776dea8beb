//! Run configuration: one TOML file for backtest and live runs.
//!
//! ```toml
//! [strategy]
//! symbol = "SPY"
//! cash_at_risk = 0.5
//!
//! [backtest]
//! start = "2020-01-01"
//! end = "2024-11-01"
//!
//! [data]
//! source = "csv"
//! csv_dir = "data"
//!
//! [news]
//! source = "file"
//! path = "news/spy.jsonl"
//! ```
//!
//! Every section is optional and falls back to its defaults.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use sentitrade_core::{ConfigError, StrategyConfig};

/// Content hash of a run configuration.
pub type RunId = String;

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BacktestSection {
    /// First date (inclusive).
    pub start: NaiveDate,
    /// Last date (inclusive).
    pub end: NaiveDate,
    pub initial_capital: f64,
    /// Tick on every n-th trading day, starting with the first.
    pub tick_interval_days: u32,
    /// Extra symbols evaluated alongside `strategy.symbol`, each independently.
    pub symbols: Vec<String>,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2024, 11, 1).unwrap_or_default(),
            initial_capital: 100_000.0,
            tick_interval_days: 1,
            symbols: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    #[default]
    Yahoo,
    Csv,
    Synthetic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataSection {
    pub source: DataSourceKind,
    /// Directory of `<SYMBOL>.csv` files, required for `source = "csv"`.
    pub csv_dir: Option<PathBuf>,
    /// Seed for `source = "synthetic"`.
    pub seed: u64,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            source: DataSourceKind::Yahoo,
            csv_dir: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NewsSourceKind {
    #[default]
    Alpaca,
    File,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NewsSection {
    pub source: NewsSourceKind,
    /// News file, required for `source = "file"`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LiveSection {
    pub interval_hours: u64,
    /// Refuse to trade against a non-paper endpoint unless false.
    pub paper: bool,
    /// Stop after this many ticks. Unbounded when absent.
    pub max_ticks: Option<u64>,
}

impl Default for LiveSection {
    fn default() -> Self {
        Self {
            interval_hours: 24,
            paper: true,
            max_ticks: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub strategy: StrategyConfig,
    pub backtest: BacktestSection,
    pub data: DataSection,
    pub news: NewsSection,
    pub live: LiveSection,
}

impl RunConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy.validate()?;

        let bt = &self.backtest;
        if bt.start > bt.end {
            return Err(invalid(
                "backtest.start",
                format!("{} is after end {}", bt.start, bt.end),
            ));
        }
        if !(bt.initial_capital.is_finite() && bt.initial_capital > 0.0) {
            return Err(invalid(
                "backtest.initial_capital",
                format!("must be positive, got {}", bt.initial_capital),
            ));
        }
        if bt.tick_interval_days == 0 {
            return Err(invalid("backtest.tick_interval_days", "must be at least 1"));
        }
        if bt.symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(invalid("backtest.symbols", "symbols must not be empty"));
        }

        if self.data.source == DataSourceKind::Csv && self.data.csv_dir.is_none() {
            return Err(invalid("data.csv_dir", "required when data.source = \"csv\""));
        }
        if self.news.source == NewsSourceKind::File && self.news.path.is_none() {
            return Err(invalid("news.path", "required when news.source = \"file\""));
        }
        if self.live.interval_hours == 0 {
            return Err(invalid("live.interval_hours", "must be at least 1"));
        }
        Ok(())
    }

    /// `strategy.symbol` followed by `backtest.symbols`, de-duplicated, order kept.
    pub fn symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(1 + self.backtest.symbols.len());
        for symbol in std::iter::once(&self.strategy.symbol).chain(&self.backtest.symbols) {
            let symbol = symbol.trim().to_uppercase();
            if !out.contains(&symbol) {
                out.push(symbol);
            }
        }
        out
    }

    /// Strategy settings for one symbol of a multi-symbol run.
    pub fn strategy_for(&self, symbol: &str) -> StrategyConfig {
        StrategyConfig {
            symbol: symbol.to_string(),
            ..self.strategy.clone()
        }
    }

    /// Deterministic id: BLAKE3 over the canonical JSON form.
    ///
    /// Two identical configs share a run id and therefore an artifact directory.
    pub fn run_id(&self) -> Result<RunId, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
