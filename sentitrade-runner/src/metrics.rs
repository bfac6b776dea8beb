//! Performance metrics over a backtest's equity curve and fill tape.
//!
//! Curve metrics are pure functions of `&[f64]`; counts come from the fills.

use serde::{Deserialize, Serialize};

use sentitrade_core::domain::OrderSide;

use crate::paper::{FillReason, PaperFill};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    /// Negative fraction, e.g. -0.15 for a 15% drawdown.
    pub max_drawdown: f64,
    pub ticks: usize,
    pub failed_ticks: usize,
    /// Entry orders filled.
    pub orders: usize,
    pub buys: usize,
    pub sells: usize,
    pub liquidations: usize,
    pub bracket_exits: usize,
}

impl PerformanceMetrics {
    pub fn compute(equity_curve: &[f64], fills: &[PaperFill], ticks: usize, failed_ticks: usize) -> Self {
        let entries = || fills.iter().filter(|f| f.reason == FillReason::Entry);
        Self {
            total_return: total_return(equity_curve),
            cagr: cagr(equity_curve),
            sharpe: sharpe_ratio(equity_curve),
            max_drawdown: max_drawdown(equity_curve),
            ticks,
            failed_ticks,
            orders: entries().count(),
            buys: entries().filter(|f| f.side == OrderSide::Buy).count(),
            sells: entries().filter(|f| f.side == OrderSide::Sell).count(),
            liquidations: fills
                .iter()
                .filter(|f| f.reason == FillReason::Liquidation)
                .count(),
            bracket_exits: fills
                .iter()
                .filter(|f| matches!(f.reason, FillReason::TakeProfit | FillReason::StopLoss))
                .count(),
        }
    }
}

/// (final - initial) / initial. Zero for curves shorter than two points.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&last)) if equity_curve.len() >= 2 && initial > 0.0 => {
            (last - initial) / initial
        }
        _ => 0.0,
    }
}

/// Compound annual growth over 252-day years.
pub fn cagr(equity_curve: &[f64]) -> f64 {
    let (Some(&initial), Some(&last)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    if equity_curve.len() < 2 || initial <= 0.0 || last <= 0.0 {
        return 0.0;
    }
    let years = equity_curve.len() as f64 / TRADING_DAYS_PER_YEAR;
    (last / initial).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe of daily returns, zero risk-free rate.
///
/// Zero when there are fewer than two returns or the returns are constant.
pub fn sharpe_ratio(equity_curve: &[f64]) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Largest peak-to-trough decline as a negative fraction.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

pub fn daily_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fill(side: OrderSide, reason: FillReason) -> PaperFill {
        PaperFill {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            symbol: "SPY".into(),
            side,
            quantity: 1,
            price: 100.0,
            reason,
            order_id: None,
        }
    }

    #[test]
    fn total_return_basic() {
        assert!((total_return(&[100.0, 110.0]) - 0.10).abs() < 1e-12);
        assert_eq!(total_return(&[100.0]), 0.0);
        assert_eq!(total_return(&[]), 0.0);
    }

    #[test]
    fn drawdown_is_negative_fraction() {
        let dd = max_drawdown(&[100.0, 120.0, 90.0, 130.0]);
        assert!((dd + 0.25).abs() < 1e-12);
        assert_eq!(max_drawdown(&[100.0, 101.0, 102.0]), 0.0);
    }

    #[test]
    fn flat_curve_has_zero_sharpe() {
        assert_eq!(sharpe_ratio(&[100.0; 30]), 0.0);
    }

    #[test]
    fn rising_curve_has_positive_sharpe() {
        let curve: Vec<f64> = (0..50).map(|i| 100.0 * (1.0 + 0.001 * i as f64 + 0.0005 * (i % 3) as f64)).collect();
        assert!(sharpe_ratio(&curve) > 0.0);
    }

    #[test]
    fn counts_come_from_fill_reasons() {
        let fills = vec![
            fill(OrderSide::Buy, FillReason::Entry),
            fill(OrderSide::Sell, FillReason::Liquidation),
            fill(OrderSide::Sell, FillReason::Entry),
            fill(OrderSide::Buy, FillReason::StopLoss),
        ];
        let m = PerformanceMetrics::compute(&[100.0, 100.0], &fills, 10, 2);
        assert_eq!(m.orders, 2);
        assert_eq!(m.buys, 1);
        assert_eq!(m.sells, 1);
        assert_eq!(m.liquidations, 1);
        assert_eq!(m.bracket_exits, 1);
        assert_eq!(m.ticks, 10);
        assert_eq!(m.failed_ticks, 2);
    }
}
