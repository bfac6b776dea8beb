//! SentiTrade Runner: backtests, live sessions, metrics and artifacts.
//!
//! This crate builds on `sentitrade-core` to provide:
//! - A run config covering strategy, backtest window, data, news and live settings
//! - Bar loading from Yahoo, CSV or synthetic providers
//! - A paper broker that fills at the bar close and simulates bracket exits
//! - The backtest scheduler, single-symbol and parallel multi-symbol
//! - The live loop with cooperative cancellation
//! - Performance metrics and JSON/CSV/Markdown export

pub mod backtest;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod live;
pub mod metrics;
pub mod paper;

pub use backtest::{run_backtest, run_many, BacktestResult, FailedTick, RunError, SCHEMA_VERSION};
pub use config::{
    BacktestSection, DataSection, DataSourceKind, LiveSection, NewsSection, NewsSourceKind,
    RunConfig, RunId,
};
pub use data_loader::{load_bars, news_source_for, provider_for, LoadError, LoadedData};
pub use export::{load_artifacts, save_artifacts, ExportError};
pub use live::{run_live, stop_on_ctrl_c, LiveOptions, LiveSummary};
pub use metrics::PerformanceMetrics;
pub use paper::{EquityPoint, FillReason, PaperBroker, PaperFill};
