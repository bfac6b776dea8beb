//! SentiTrade CLI: backtest, live and sentiment commands.
//!
//! Commands:
//! - `backtest`: replay the strategy over historical bars and news, save artifacts
//! - `live`: tick the strategy against an Alpaca account on a fixed interval
//! - `sentiment`: score headlines with the configured model and print the result

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use sentitrade_core::broker::AlpacaBroker;
use sentitrade_core::credentials::AlpacaCredentials;
use sentitrade_core::decision::LastTrade;
use sentitrade_core::sentiment::{Lexicon, SentimentEstimator};
use sentitrade_core::SentimentStrategy;
use sentitrade_runner::{
    load_bars, news_source_for, provider_for, run_live, run_many, save_artifacts, stop_on_ctrl_c,
    BacktestResult, LiveOptions, NewsSourceKind, RunConfig,
};

#[derive(Parser)]
#[command(
    name = "sentitrade",
    about = "SentiTrade CLI: news-sentiment equities strategy"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest over historical bars and news, then save artifacts.
    Backtest {
        /// Path to a TOML run config. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the strategy symbol.
        #[arg(long)]
        symbol: Option<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,

        /// Read news from this file instead of the configured source.
        #[arg(long)]
        news_file: Option<PathBuf>,

        /// TOML lexicon replacing the built-in one.
        #[arg(long)]
        lexicon: Option<PathBuf>,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Trade on an Alpaca account every `live.interval_hours`.
    Live {
        /// Path to a TOML run config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the strategy symbol.
        #[arg(long)]
        symbol: Option<String>,

        /// Stop after this many ticks.
        #[arg(long)]
        max_ticks: Option<u64>,

        /// Starting direction, when resuming a session with an open position.
        #[arg(long, value_parser = parse_last_trade, default_value = "none")]
        last_trade: LastTrade,

        /// TOML lexicon replacing the built-in one.
        #[arg(long)]
        lexicon: Option<PathBuf>,
    },
    /// Score headlines and print the aggregated sentiment.
    Sentiment {
        /// Headlines to score together.
        #[arg(required = true)]
        headlines: Vec<String>,

        /// TOML lexicon replacing the built-in one.
        #[arg(long)]
        lexicon: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            config,
            symbol,
            start,
            end,
            news_file,
            lexicon,
            output_dir,
        } => run_backtest_cmd(config, symbol, start, end, news_file, lexicon, output_dir),
        Commands::Live {
            config,
            symbol,
            max_ticks,
            last_trade,
            lexicon,
        } => run_live_cmd(config, symbol, max_ticks, last_trade, lexicon),
        Commands::Sentiment { headlines, lexicon } => run_sentiment_cmd(&headlines, lexicon),
    }
}

fn parse_last_trade(s: &str) -> Result<LastTrade, String> {
    match s.to_ascii_lowercase().as_str() {
        "none" => Ok(LastTrade::None),
        "buy" => Ok(LastTrade::Buy),
        "sell" => Ok(LastTrade::Sell),
        other => Err(format!("expected none, buy or sell, got '{other}'")),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn load_config(path: Option<&Path>, symbol: Option<String>) -> Result<RunConfig> {
    let mut config = match path {
        Some(path) => RunConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(symbol) = symbol {
        config.strategy.symbol = symbol.to_uppercase();
    }
    Ok(config)
}

fn load_estimator(lexicon: Option<&Path>) -> Result<Arc<SentimentEstimator>> {
    let estimator = match lexicon {
        Some(path) => {
            let lexicon = Lexicon::from_path(path)
                .with_context(|| format!("failed to load lexicon {}", path.display()))?;
            SentimentEstimator::from_lexicon(&lexicon)
        }
        None => SentimentEstimator::builtin(),
    };
    tracing::debug!(model = estimator.model_name(), "sentiment model ready");
    Ok(Arc::new(estimator))
}

fn run_backtest_cmd(
    config_path: Option<PathBuf>,
    symbol: Option<String>,
    start: Option<String>,
    end: Option<String>,
    news_file: Option<PathBuf>,
    lexicon: Option<PathBuf>,
    output_dir: PathBuf,
) -> Result<()> {
    let mut config = load_config(config_path.as_deref(), symbol)?;
    if let Some(start) = start.as_deref() {
        config.backtest.start = parse_date(start)?;
    }
    if let Some(end) = end.as_deref() {
        config.backtest.end = parse_date(end)?;
    }
    if let Some(path) = news_file {
        config.news.source = NewsSourceKind::File;
        config.news.path = Some(path);
    }
    config.validate()?;

    let estimator = load_estimator(lexicon.as_deref())?;
    let provider = provider_for(&config.data)?;
    let news = news_source_for(&config.news)?;
    let data = load_bars(
        &config.symbols(),
        provider.as_ref(),
        config.backtest.start,
        config.backtest.end,
    )?;

    let mut failures = 0;
    for (symbol, outcome) in run_many(&config, &data, news.as_ref(), estimator) {
        match outcome {
            Ok(result) => {
                print_summary(&result);
                let run_dir = save_artifacts(&result, &output_dir)?;
                println!("Artifacts saved to: {}", run_dir.display());
            }
            Err(e) => {
                failures += 1;
                eprintln!("Backtest for {symbol} failed: {e}");
            }
        }
    }
    if failures > 0 {
        bail!("{failures} backtest(s) failed");
    }
    Ok(())
}

fn run_live_cmd(
    config_path: Option<PathBuf>,
    symbol: Option<String>,
    max_ticks: Option<u64>,
    last_trade: LastTrade,
    lexicon: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path.as_deref(), symbol)?;
    if max_ticks.is_some() {
        config.live.max_ticks = max_ticks;
    }
    config.validate()?;

    let credentials = AlpacaCredentials::from_env()?;
    if config.live.paper && !credentials.is_paper() {
        bail!(
            "refusing to trade against {} with live.paper = true",
            credentials.base_url
        );
    }

    let estimator = load_estimator(lexicon.as_deref())?;
    let news = news_source_for(&config.news)?;
    let mut broker = AlpacaBroker::new(credentials)?;
    let mut strategy =
        SentimentStrategy::new(config.strategy.clone(), estimator)?.with_state(last_trade);

    let stop = stop_on_ctrl_c().context("failed to install the Ctrl-C handler")?;
    let summary = run_live(
        &mut strategy,
        &mut broker,
        news.as_ref(),
        LiveOptions::from_section(&config.live),
        &stop,
        |outcome| match outcome {
            Ok(report) => println!(
                "{} {} {} ({:.4}) -> {}",
                report.date,
                report.symbol,
                report.sentiment.label,
                report.sentiment.confidence,
                report.decision
            ),
            Err(e) => eprintln!("tick failed: {e}"),
        },
    );

    println!(
        "Session ended: {} ticks, {} submitted, {} failed, last trade {}",
        summary.ticks,
        summary.submitted,
        summary.failed,
        strategy.state().last_trade
    );
    Ok(())
}

fn run_sentiment_cmd(headlines: &[String], lexicon: Option<PathBuf>) -> Result<()> {
    let estimator = load_estimator(lexicon.as_deref())?;
    let result = estimator.estimate(headlines)?;
    println!("{} {:.6}", result.label, result.confidence);
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Symbol:         {}", result.symbol);
    println!("Period:         {} to {}", result.start_date, result.end_date);
    println!("Bars:           {}", result.equity_curve.len());
    println!("Ticks:          {} ({} failed)", m.ticks, m.failed_ticks);
    println!("Orders:         {} ({} buy / {} sell)", m.orders, m.buys, m.sells);
    println!("Liquidations:   {}", m.liquidations);
    println!("Bracket Exits:  {}", m.bracket_exits);
    println!();
    println!("--- Performance ---");
    println!("Final Equity:   ${:.2}", result.final_equity);
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("CAGR:           {:.2}%", m.cagr * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Final Position: {}", result.final_last_trade);
}
