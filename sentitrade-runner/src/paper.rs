//! Simulated broker for backtests.
//!
//! One `PaperBroker` per symbol. Market orders fill in full at the current
//! bar's close; a buy whose notional exceeds cash is rejected. Positions are signed (shorts are negative) and short sales
//! credit cash. Bracket legs are checked at the start of each new bar with a
//! worst-case path: when a bar reaches both levels the stop is assumed to
//! have hit first, and a bar that opens past a level fills at the open.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use sentitrade_core::broker::{BrokerError, MarketData, OrderExecution};
use sentitrade_core::domain::{
    AckStatus, Bar, BracketLevels, Order, OrderHandle, OrderId, OrderSide, SubmissionAck,
};

/// Why a fill happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillReason {
    Entry,
    Liquidation,
    TakeProfit,
    StopLoss,
}

impl FillReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Liquidation => "liquidation",
            Self::TakeProfit => "take_profit",
            Self::StopLoss => "stop_loss",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperFill {
    pub date: NaiveDate,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub price: f64,
    pub reason: FillReason,
    /// Set for entries; exits and liquidations have no originating order.
    pub order_id: Option<OrderId>,
}

/// Account snapshot at a bar close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub close: f64,
    pub cash: f64,
    pub position: i64,
    pub equity: f64,
}

/// Resting exit legs of a filled bracket entry.
#[derive(Debug, Clone, PartialEq)]
struct BracketExit {
    entry_side: OrderSide,
    quantity: u64,
    levels: BracketLevels,
}

impl BracketExit {
    /// Fill price and reason if `bar` reaches a leg. Stop wins ties.
    fn triggered_by(&self, bar: &Bar) -> Option<(f64, FillReason)> {
        let BracketLevels {
            take_profit_price: tp,
            stop_loss_price: sl,
        } = self.levels;
        match self.entry_side {
            OrderSide::Buy => {
                if bar.low <= sl {
                    Some((bar.open.min(sl), FillReason::StopLoss))
                } else if bar.high >= tp {
                    Some((bar.open.max(tp), FillReason::TakeProfit))
                } else {
                    None
                }
            }
            OrderSide::Sell => {
                if bar.high >= sl {
                    Some((bar.open.max(sl), FillReason::StopLoss))
                } else if bar.low <= tp {
                    Some((bar.open.min(tp), FillReason::TakeProfit))
                } else {
                    None
                }
            }
        }
    }
}

fn opposite(side: OrderSide) -> OrderSide {
    match side {
        OrderSide::Buy => OrderSide::Sell,
        OrderSide::Sell => OrderSide::Buy,
    }
}

#[derive(Debug, Clone)]
pub struct PaperBroker {
    symbol: String,
    cash: f64,
    position: i64,
    bar: Option<Bar>,
    pending: HashMap<OrderId, Order>,
    exits: Vec<BracketExit>,
    fills: Vec<PaperFill>,
    next_id: u64,
}

impl PaperBroker {
    pub fn new(symbol: impl Into<String>, initial_cash: f64) -> Self {
        Self {
            symbol: symbol.into(),
            cash: initial_cash,
            position: 0,
            bar: None,
            pending: HashMap::new(),
            exits: Vec::new(),
            fills: Vec::new(),
            next_id: 0,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Signed share count: positive long, negative short.
    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn fills(&self) -> &[PaperFill] {
        &self.fills
    }

    pub fn into_fills(self) -> Vec<PaperFill> {
        self.fills
    }

    pub fn current_bar(&self) -> Option<&Bar> {
        self.bar.as_ref()
    }

    /// Cash plus the position marked at the current close.
    pub fn equity(&self) -> f64 {
        let mark = self.bar.as_ref().map_or(0.0, |b| b.close);
        self.cash + self.position as f64 * mark
    }

    pub fn snapshot(&self) -> Option<EquityPoint> {
        self.bar.as_ref().map(|bar| EquityPoint {
            date: bar.date,
            close: bar.close,
            cash: self.cash,
            position: self.position,
            equity: self.equity(),
        })
    }

    /// Move to `bar`, first resolving any bracket legs it reaches.
    ///
    /// Returns the number of exit fills.
    pub fn advance(&mut self, bar: &Bar) -> usize {
        let exits = std::mem::take(&mut self.exits);
        let mut filled = 0;
        for exit in exits {
            match exit.triggered_by(bar) {
                Some((price, reason)) => {
                    let held = match exit.entry_side {
                        OrderSide::Buy => self.position.max(0),
                        OrderSide::Sell => (-self.position).max(0),
                    };
                    let quantity = exit.quantity.min(held.unsigned_abs());
                    if quantity > 0 {
                        self.record_fill(bar.date, opposite(exit.entry_side), quantity, price, reason, None);
                        filled += 1;
                    }
                }
                None => self.exits.push(exit),
            }
        }
        self.bar = Some(bar.clone());
        filled
    }

    fn require_bar(&self) -> Result<&Bar, BrokerError> {
        self.bar.as_ref().ok_or_else(|| BrokerError::NoPrice {
            symbol: self.symbol.clone(),
        })
    }

    fn record_fill(
        &mut self,
        date: NaiveDate,
        side: OrderSide,
        quantity: u64,
        price: f64,
        reason: FillReason,
        order_id: Option<OrderId>,
    ) {
        let notional = price * quantity as f64;
        match side {
            OrderSide::Buy => {
                self.cash -= notional;
                self.position += quantity as i64;
            }
            OrderSide::Sell => {
                self.cash += notional;
                self.position -= quantity as i64;
            }
        }
        tracing::debug!(
            %date,
            symbol = %self.symbol,
            %side,
            quantity,
            price,
            reason = reason.as_str(),
            "paper fill"
        );
        self.fills.push(PaperFill {
            date,
            symbol: self.symbol.clone(),
            side,
            quantity,
            price,
            reason,
            order_id,
        });
    }
}

impl MarketData for PaperBroker {
    fn cash(&self) -> Result<f64, BrokerError> {
        Ok(self.cash)
    }

    fn last_price(&self, symbol: &str) -> Result<f64, BrokerError> {
        if symbol != self.symbol {
            return Err(BrokerError::NoPrice {
                symbol: symbol.to_string(),
            });
        }
        Ok(self.require_bar()?.close)
    }

    fn current_date(&self) -> Result<NaiveDate, BrokerError> {
        Ok(self.require_bar()?.date)
    }
}

impl OrderExecution for PaperBroker {
    fn create_order(&mut self, order: Order) -> Result<OrderHandle, BrokerError> {
        if order.symbol != self.symbol {
            return Err(BrokerError::Rejected(format!(
                "paper broker for {} cannot trade {}",
                self.symbol, order.symbol
            )));
        }
        if order.quantity == 0 {
            return Err(BrokerError::Rejected("quantity must be positive".into()));
        }
        self.next_id += 1;
        let id = OrderId::new(format!("paper-{}", self.next_id));
        self.pending.insert(id.clone(), order.clone());
        Ok(OrderHandle { id, order })
    }

    fn submit_order(&mut self, handle: &OrderHandle) -> Result<SubmissionAck, BrokerError> {
        let (date, price) = {
            let bar = self.require_bar()?;
            (bar.date, bar.close)
        };
        let order = self
            .pending
            .remove(&handle.id)
            .ok_or_else(|| BrokerError::UnknownOrder(handle.id.clone()))?;

        let notional = price * order.quantity as f64;
        if order.side == OrderSide::Buy && notional > self.cash {
            return Err(BrokerError::Rejected(format!(
                "insufficient buying power: {} x{} at {price:.2} needs {notional:.2}, cash {:.2}",
                order.symbol, order.quantity, self.cash
            )));
        }

        self.record_fill(
            date,
            order.side,
            order.quantity,
            price,
            FillReason::Entry,
            Some(handle.id.clone()),
        );
        if let Some(levels) = order.bracket_levels() {
            self.exits.push(BracketExit {
                entry_side: order.side,
                quantity: order.quantity,
                levels,
            });
        }
        Ok(SubmissionAck {
            order_id: handle.id.clone(),
            status: AckStatus::Filled,
            fill_price: Some(price),
        })
    }

    fn liquidate_all(&mut self, symbol: &str) -> Result<(), BrokerError> {
        if symbol != self.symbol {
            return Ok(());
        }
        self.exits.clear();
        if self.position == 0 {
            return Ok(());
        }
        let (date, price) = {
            let bar = self.require_bar()?;
            (bar.date, bar.close)
        };
        let side = if self.position > 0 {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };
        let quantity = self.position.unsigned_abs();
        self.record_fill(date, side, quantity, price, FillReason::Liquidation, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            symbol: "SPY".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open,
            high,
            low,
            close,
            volume: 1_000,
        }
    }

    fn flat(day: u32, close: f64) -> Bar {
        bar(day, close, close, close, close)
    }

    fn submit(broker: &mut PaperBroker, order: Order) -> SubmissionAck {
        let handle = broker.create_order(order).unwrap();
        broker.submit_order(&handle).unwrap()
    }

    #[test]
    fn no_bar_means_no_price() {
        let broker = PaperBroker::new("SPY", 10_000.0);
        assert!(matches!(broker.last_price("SPY"), Err(BrokerError::NoPrice { .. })));
        assert!(broker.current_date().is_err());
        assert_eq!(broker.cash().unwrap(), 10_000.0);
    }

    #[test]
    fn market_buy_fills_at_close() {
        let mut broker = PaperBroker::new("SPY", 10_000.0);
        broker.advance(&flat(2, 400.0));
        let ack = submit(&mut broker, Order::market("SPY", 13, OrderSide::Buy));
        assert_eq!(ack.status, AckStatus::Filled);
        assert_eq!(ack.fill_price, Some(400.0));
        assert_eq!(broker.position(), 13);
        assert!((broker.cash().unwrap() - 4_800.0).abs() < 1e-9);
        assert!((broker.equity() - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn short_sale_credits_cash_and_marks_negative() {
        let mut broker = PaperBroker::new("SPY", 10_000.0);
        broker.advance(&flat(2, 400.0));
        submit(&mut broker, Order::market("SPY", 10, OrderSide::Sell));
        assert_eq!(broker.position(), -10);
        assert!((broker.cash().unwrap() - 14_000.0).abs() < 1e-9);

        broker.advance(&flat(3, 390.0));
        assert!((broker.equity() - 10_100.0).abs() < 1e-9);
    }

    #[test]
    fn liquidate_closes_either_direction() {
        let mut broker = PaperBroker::new("SPY", 10_000.0);
        broker.advance(&flat(2, 100.0));
        submit(&mut broker, Order::market("SPY", 5, OrderSide::Sell));
        broker.advance(&flat(3, 90.0));
        broker.liquidate_all("SPY").unwrap();
        assert_eq!(broker.position(), 0);
        let last = broker.fills().last().unwrap();
        assert_eq!(last.reason, FillReason::Liquidation);
        assert_eq!(last.side, OrderSide::Buy);
        assert!((broker.cash().unwrap() - 10_050.0).abs() < 1e-9);
    }

    #[test]
    fn liquidating_flat_or_foreign_symbol_is_noop() {
        let mut broker = PaperBroker::new("SPY", 10_000.0);
        broker.liquidate_all("SPY").unwrap();
        broker.liquidate_all("QQQ").unwrap();
        assert!(broker.fills().is_empty());
    }

    #[test]
    fn rejects_foreign_symbol_and_zero_quantity() {
        let mut broker = PaperBroker::new("SPY", 10_000.0);
        assert!(matches!(
            broker.create_order(Order::market("QQQ", 1, OrderSide::Buy)),
            Err(BrokerError::Rejected(_))
        ));
        assert!(broker.create_order(Order::market("SPY", 0, OrderSide::Buy)).is_err());
    }

    #[test]
    fn unknown_handle_is_rejected() {
        let mut broker = PaperBroker::new("SPY", 10_000.0);
        broker.advance(&flat(2, 100.0));
        let handle = broker.create_order(Order::market("SPY", 1, OrderSide::Buy)).unwrap();
        broker.submit_order(&handle).unwrap();
        assert!(matches!(
            broker.submit_order(&handle),
            Err(BrokerError::UnknownOrder(_))
        ));
        assert_eq!(broker.position(), 1);
    }

    #[test]
    fn buy_beyond_cash_is_rejected_and_consumed() {
        let mut broker = PaperBroker::new("SPY", 10_000.0);
        broker.advance(&flat(2, 400.0));
        let handle = broker.create_order(Order::market("SPY", 26, OrderSide::Buy)).unwrap();
        assert!(matches!(broker.submit_order(&handle), Err(BrokerError::Rejected(_))));
        assert_eq!(broker.position(), 0);
        assert_eq!(broker.cash().unwrap(), 10_000.0);
        assert!(broker.fills().is_empty());
        assert!(matches!(
            broker.submit_order(&handle),
            Err(BrokerError::UnknownOrder(_))
        ));

        // Exactly the available cash is accepted.
        submit(&mut broker, Order::market("SPY", 25, OrderSide::Buy));
        assert_eq!(broker.position(), 25);
        assert_eq!(broker.cash().unwrap(), 0.0);
    }

    #[test]
    fn short_sales_are_not_limited_by_cash() {
        let mut broker = PaperBroker::new("SPY", 1_000.0);
        broker.advance(&flat(2, 400.0));
        submit(&mut broker, Order::market("SPY", 10, OrderSide::Sell));
        assert_eq!(broker.position(), -10);
    }

    #[test]
    fn long_bracket_stops_first_when_both_levels_hit() {
        let mut broker = PaperBroker::new("SPY", 10_000.0);
        broker.advance(&flat(2, 100.0));
        let levels = BracketLevels::for_entry(OrderSide::Buy, 100.0, 0.20, 0.05);
        submit(&mut broker, Order::bracket("SPY", 10, OrderSide::Buy, levels));

        assert_eq!(broker.advance(&bar(3, 100.0, 125.0, 90.0, 110.0)), 1);
        let exit = broker.fills().last().unwrap();
        assert_eq!(exit.reason, FillReason::StopLoss);
        assert!((exit.price - 95.0).abs() < 1e-9);
        assert_eq!(broker.position(), 0);
    }

    #[test]
    fn gap_through_stop_fills_at_open() {
        let mut broker = PaperBroker::new("SPY", 10_000.0);
        broker.advance(&flat(2, 100.0));
        let levels = BracketLevels::for_entry(OrderSide::Buy, 100.0, 0.20, 0.05);
        submit(&mut broker, Order::bracket("SPY", 10, OrderSide::Buy, levels));

        broker.advance(&bar(3, 90.0, 91.0, 88.0, 89.0));
        let exit = broker.fills().last().unwrap();
        assert!((exit.price - 90.0).abs() < 1e-9);
    }

    #[test]
    fn short_bracket_takes_profit_below() {
        let mut broker = PaperBroker::new("SPY", 10_000.0);
        broker.advance(&flat(2, 100.0));
        let levels = BracketLevels::for_entry(OrderSide::Sell, 100.0, 0.20, 0.05);
        submit(&mut broker, Order::bracket("SPY", 10, OrderSide::Sell, levels));

        assert_eq!(broker.advance(&bar(3, 99.0, 101.0, 97.0, 98.0)), 0);
        assert_eq!(broker.advance(&bar(4, 85.0, 86.0, 78.0, 79.0)), 1);
        let exit = broker.fills().last().unwrap();
        assert_eq!(exit.reason, FillReason::TakeProfit);
        assert_eq!(exit.side, OrderSide::Buy);
        assert!((exit.price - 80.0).abs() < 1e-9);
        assert_eq!(broker.position(), 0);
    }

    #[test]
    fn liquidation_cancels_resting_legs() {
        let mut broker = PaperBroker::new("SPY", 10_000.0);
        broker.advance(&flat(2, 100.0));
        let levels = BracketLevels::for_entry(OrderSide::Buy, 100.0, 0.20, 0.05);
        submit(&mut broker, Order::bracket("SPY", 10, OrderSide::Buy, levels));
        broker.liquidate_all("SPY").unwrap();
        assert_eq!(broker.advance(&bar(3, 100.0, 130.0, 80.0, 100.0)), 0);
        assert_eq!(broker.fills().len(), 2);
    }
}
