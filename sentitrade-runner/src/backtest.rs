//! Backtest scheduler: walk daily bars, tick the strategy, record everything.
//!
//! Entry points:
//! - `run_backtest()`: one symbol over pre-loaded bars.
//! - `run_many()`: every symbol in a `LoadedData`, in parallel. Each symbol
//!   gets its own strategy state and paper broker; only the sentiment
//!   estimator is shared.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use sentitrade_core::data::DataSource;
use sentitrade_core::decision::LastTrade;
use sentitrade_core::domain::Bar;
use sentitrade_core::news::NewsSource;
use sentitrade_core::sentiment::SentimentEstimator;
use sentitrade_core::{ConfigError, SentimentStrategy, StrategyConfig, TickReport};

use crate::config::RunConfig;
use crate::data_loader::{LoadError, LoadedData};
use crate::metrics::PerformanceMetrics;
use crate::paper::{EquityPoint, PaperBroker, PaperFill};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("data error: {0}")]
    Data(#[from] LoadError),

    #[error("no bars for '{symbol}' between {start} and {end}")]
    NoBars {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("symbol '{0}' not found in loaded data")]
    SymbolNotFound(String),

    #[error("failed to derive run id: {0}")]
    RunId(#[from] serde_json::Error),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// A tick that returned an error. The run carried on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTick {
    pub date: NaiveDate,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub data_source: Option<DataSource>,
    pub dataset_hash: Option<String>,
    pub config: StrategyConfig,
    pub metrics: PerformanceMetrics,
    pub equity_curve: Vec<EquityPoint>,
    pub ticks: Vec<TickReport>,
    pub failed_ticks: Vec<FailedTick>,
    pub fills: Vec<PaperFill>,
    pub final_last_trade: LastTrade,
}

impl BacktestResult {
    pub fn equity_values(&self) -> Vec<f64> {
        self.equity_curve.iter().map(|p| p.equity).collect()
    }
}

/// Backtest `symbol` over `bars` (oldest first).
///
/// Bars outside `[backtest.start, backtest.end]` are skipped. The strategy
/// ticks on trading-day indices that are multiples of `tick_interval_days`;
/// bracket legs are checked on every bar. A failed tick is logged and
/// recorded, and the run continues with the next bar.
pub fn run_backtest(
    config: &RunConfig,
    symbol: &str,
    bars: &[Bar],
    news: &dyn NewsSource,
    estimator: Arc<SentimentEstimator>,
) -> Result<BacktestResult, RunError> {
    let section = &config.backtest;
    let strategy_config = config.strategy_for(symbol);
    let mut strategy = SentimentStrategy::new(strategy_config.clone(), estimator)?;
    let mut broker = PaperBroker::new(symbol, section.initial_capital);
    let interval = section.tick_interval_days.max(1) as usize;

    let mut equity_curve = Vec::new();
    let mut ticks = Vec::new();
    let mut failed_ticks = Vec::new();

    let in_range = bars
        .iter()
        .filter(|b| b.date >= section.start && b.date <= section.end);
    for (i, bar) in in_range.enumerate() {
        broker.advance(bar);
        if i % interval == 0 {
            match strategy.on_tick(&mut broker, news) {
                Ok(report) => ticks.push(report),
                Err(e) => {
                    tracing::warn!(date = %bar.date, %symbol, error = %e, "tick failed");
                    failed_ticks.push(FailedTick {
                        date: bar.date,
                        error: e.to_string(),
                    });
                }
            }
        }
        if let Some(point) = broker.snapshot() {
            equity_curve.push(point);
        }
    }

    if equity_curve.is_empty() {
        return Err(RunError::NoBars {
            symbol: symbol.to_string(),
            start: section.start,
            end: section.end,
        });
    }

    let curve: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
    let final_equity = broker.equity();
    let final_last_trade = strategy.state().last_trade;
    let fills = broker.into_fills();
    let metrics = PerformanceMetrics::compute(&curve, &fills, ticks.len(), failed_ticks.len());

    tracing::info!(
        %symbol,
        bars = equity_curve.len(),
        ticks = metrics.ticks,
        failed = metrics.failed_ticks,
        orders = metrics.orders,
        total_return = metrics.total_return,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id()?,
        symbol: symbol.to_string(),
        start_date: section.start,
        end_date: section.end,
        initial_capital: section.initial_capital,
        final_equity,
        data_source: None,
        dataset_hash: None,
        config: strategy_config,
        metrics,
        equity_curve,
        ticks,
        failed_ticks,
        fills,
        final_last_trade,
    })
}

/// Backtest every symbol of `config` against `data`, one rayon task per symbol.
///
/// Results come back in `config.symbols()` order.
pub fn run_many(
    config: &RunConfig,
    data: &LoadedData,
    news: &dyn NewsSource,
    estimator: Arc<SentimentEstimator>,
) -> Vec<(String, Result<BacktestResult, RunError>)> {
    config
        .symbols()
        .into_par_iter()
        .map(|symbol| {
            let result = match data.bars_for(&symbol) {
                Some(bars) => run_backtest(config, &symbol, bars, news, Arc::clone(&estimator)).map(
                    |mut result| {
                        result.data_source = Some(data.source);
                        result.dataset_hash = Some(data.dataset_hash.clone());
                        result
                    },
                ),
                None => Err(RunError::SymbolNotFound(symbol.clone())),
            };
            (symbol, result)
        })
        .collect()
}
