//! Artifact export: JSON result, CSV tapes and a Markdown summary.
//!
//! A run directory holds:
//! - `result.json`: the full `BacktestResult`, schema-versioned
//! - `orders.csv`: every paper fill
//! - `equity.csv`: bar-by-bar account snapshots
//! - `ticks.csv`: one row per successful tick
//! - `report.md`: human-readable summary
//!
//! Unknown schema versions are rejected on load.

use std::path::{Path, PathBuf};
use thiserror::Error;

use sentitrade_core::TickReport;

use crate::backtest::{BacktestResult, SCHEMA_VERSION};
use crate::paper::{EquityPoint, PaperFill};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv output is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("unsupported schema version {found} (max supported: {supported})")]
    SchemaVersion { found: u32, supported: u32 },
}

fn io_at(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr.into_inner().map_err(|e| ExportError::Csv(e.into_error().into()))?;
    Ok(String::from_utf8(data)?)
}

pub fn export_json(result: &BacktestResult) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(result)?)
}

pub fn import_json(json: &str) -> Result<BacktestResult, ExportError> {
    let result: BacktestResult = serde_json::from_str(json)?;
    if result.schema_version > SCHEMA_VERSION {
        return Err(ExportError::SchemaVersion {
            found: result.schema_version,
            supported: SCHEMA_VERSION,
        });
    }
    Ok(result)
}

/// Columns: date, symbol, side, quantity, price, reason, order_id
pub fn export_orders_csv(fills: &[PaperFill]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "symbol", "side", "quantity", "price", "reason", "order_id"])?;
    for f in fills {
        wtr.write_record([
            f.date.to_string(),
            f.symbol.clone(),
            f.side.to_string(),
            f.quantity.to_string(),
            format!("{:.2}", f.price),
            f.reason.as_str().to_string(),
            f.order_id.as_ref().map(ToString::to_string).unwrap_or_default(),
        ])?;
    }
    finish(wtr)
}

pub fn export_equity_csv(curve: &[EquityPoint]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "close", "cash", "position", "equity"])?;
    for p in curve {
        wtr.write_record([
            p.date.to_string(),
            format!("{:.2}", p.close),
            format!("{:.2}", p.cash),
            p.position.to_string(),
            format!("{:.2}", p.equity),
        ])?;
    }
    finish(wtr)
}

/// Columns: date, symbol, headlines, label, confidence, cash, last_price,
/// quantity, decision, liquidated, order_id, last_trade_before, last_trade_after
pub fn export_ticks_csv(ticks: &[TickReport]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "symbol",
        "headlines",
        "label",
        "confidence",
        "cash",
        "last_price",
        "quantity",
        "decision",
        "liquidated",
        "order_id",
        "last_trade_before",
        "last_trade_after",
    ])?;
    for t in ticks {
        wtr.write_record([
            t.date.to_string(),
            t.symbol.clone(),
            t.headlines.to_string(),
            t.sentiment.label.to_string(),
            format!("{:.6}", t.sentiment.confidence),
            format!("{:.2}", t.sizing.cash),
            format!("{:.2}", t.sizing.last_price),
            t.sizing.quantity.to_string(),
            t.decision.to_string(),
            t.liquidated.to_string(),
            t.ack.as_ref().map(|a| a.order_id.to_string()).unwrap_or_default(),
            t.last_trade_before.to_string(),
            t.last_trade_after.to_string(),
        ])?;
    }
    finish(wtr)
}

pub fn generate_report(result: &BacktestResult) -> String {
    let m = &result.metrics;
    let mut md = String::with_capacity(1024);
    md.push_str(&format!("# Backtest: {}\n\n", result.symbol));
    md.push_str("| Field | Value |\n| --- | --- |\n");
    md.push_str(&format!("| Period | {} to {} |\n", result.start_date, result.end_date));
    md.push_str(&format!("| Initial Capital | ${:.0} |\n", result.initial_capital));
    md.push_str(&format!("| Final Equity | ${:.2} |\n", result.final_equity));
    md.push_str(&format!("| Order Type | {} |\n", result.config.order_type));
    md.push_str(&format!("| Cash at Risk | {} |\n", result.config.cash_at_risk));
    if let Some(hash) = &result.dataset_hash {
        md.push_str(&format!("| Dataset Hash | {} |\n", hash));
    }
    md.push_str(&format!("| Run Id | {} |\n\n", result.run_id));

    md.push_str("## Performance\n\n| Metric | Value |\n| --- | --- |\n");
    md.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return * 100.0));
    md.push_str(&format!("| CAGR | {:.2}% |\n", m.cagr * 100.0));
    md.push_str(&format!("| Sharpe | {:.3} |\n", m.sharpe));
    md.push_str(&format!("| Max Drawdown | {:.2}% |\n", m.max_drawdown * 100.0));
    md.push_str(&format!("| Ticks | {} ({} failed) |\n", m.ticks, m.failed_ticks));
    md.push_str(&format!("| Orders | {} ({} buy / {} sell) |\n", m.orders, m.buys, m.sells));
    md.push_str(&format!("| Liquidations | {} |\n", m.liquidations));
    md.push_str(&format!("| Bracket Exits | {} |\n", m.bracket_exits));
    md.push_str(&format!("| Final Position | {} |\n", result.final_last_trade));
    md
}

/// Write the artifact set under `output_dir/{symbol}_{run_id prefix}/`.
///
/// Returns the created directory. Re-running the same config overwrites it.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf, ExportError> {
    let prefix: String = result.run_id.chars().take(12).collect();
    let run_dir = output_dir.join(format!("{}_{}", result.symbol, prefix));
    std::fs::create_dir_all(&run_dir).map_err(io_at(&run_dir))?;

    let files = [
        ("result.json", export_json(result)?),
        ("orders.csv", export_orders_csv(&result.fills)?),
        ("equity.csv", export_equity_csv(&result.equity_curve)?),
        ("ticks.csv", export_ticks_csv(&result.ticks)?),
        ("report.md", generate_report(result)),
    ];
    for (name, contents) in files {
        let path = run_dir.join(name);
        std::fs::write(&path, contents).map_err(io_at(&path))?;
    }
    tracing::info!(dir = %run_dir.display(), "artifacts written");
    Ok(run_dir)
}

pub fn load_artifacts(dir: &Path) -> Result<BacktestResult, ExportError> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path).map_err(io_at(&path))?;
    import_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sentitrade_core::decision::LastTrade;
    use sentitrade_core::domain::{OrderId, OrderSide};
    use sentitrade_core::StrategyConfig;

    use crate::metrics::PerformanceMetrics;
    use crate::paper::FillReason;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn sample() -> BacktestResult {
        let fills = vec![PaperFill {
            date: date(2),
            symbol: "SPY".into(),
            side: OrderSide::Sell,
            quantity: 13,
            price: 400.0,
            reason: FillReason::Entry,
            order_id: Some(OrderId::new("paper-1")),
        }];
        let equity_curve = vec![
            EquityPoint {
                date: date(2),
                close: 400.0,
                cash: 15_200.0,
                position: -13,
                equity: 10_000.0,
            },
            EquityPoint {
                date: date(3),
                close: 390.0,
                cash: 15_200.0,
                position: -13,
                equity: 10_130.0,
            },
        ];
        BacktestResult {
            schema_version: SCHEMA_VERSION,
            run_id: "0123456789abcdef0123".into(),
            symbol: "SPY".into(),
            start_date: date(1),
            end_date: date(31),
            initial_capital: 10_000.0,
            final_equity: 10_130.0,
            data_source: None,
            dataset_hash: None,
            config: StrategyConfig::default(),
            metrics: PerformanceMetrics::compute(&[10_000.0, 10_130.0], &fills, 2, 0),
            equity_curve,
            ticks: Vec::new(),
            failed_ticks: Vec::new(),
            fills,
            final_last_trade: LastTrade::Sell,
        }
    }

    #[test]
    fn orders_csv_has_header_and_rows() {
        let csv = export_orders_csv(&sample().fills).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "date,symbol,side,quantity,price,reason,order_id");
        assert_eq!(lines[1], "2024-01-02,SPY,sell,13,400.00,entry,paper-1");
    }

    #[test]
    fn equity_csv_rows_match_curve() {
        let csv = export_equity_csv(&sample().equity_curve).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.contains("2024-01-03,390.00,15200.00,-13,10130.00"));
    }

    #[test]
    fn future_schema_is_rejected() {
        let mut result = sample();
        result.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&result).unwrap();
        assert!(matches!(
            import_json(&json),
            Err(ExportError::SchemaVersion { .. })
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample();
        let run_dir = save_artifacts(&result, dir.path()).unwrap();
        assert!(run_dir.ends_with("SPY_0123456789ab"));
        for name in ["result.json", "orders.csv", "equity.csv", "ticks.csv", "report.md"] {
            assert!(run_dir.join(name).exists(), "{name} missing");
        }
        let loaded = load_artifacts(&run_dir).unwrap();
        assert_eq!(loaded.fills, result.fills);
        assert_eq!(loaded.final_last_trade, LastTrade::Sell);
    }

    #[test]
    fn report_mentions_key_figures() {
        let md = generate_report(&sample());
        assert!(md.contains("# Backtest: SPY"));
        assert!(md.contains("| Orders | 1 (0 buy / 1 sell) |"));
    }
}
