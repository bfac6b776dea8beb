//! Orders, order shapes, and broker acknowledgements.

use super::ids::OrderId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order shape selected by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    /// Plain market order.
    #[default]
    Market,
    /// Market entry with attached take-profit and stop-loss exits.
    Bracket,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Bracket => "bracket",
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exit prices attached to a bracket entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BracketLevels {
    pub take_profit_price: f64,
    pub stop_loss_price: f64,
}

impl BracketLevels {
    /// Exit levels around `last_price` for an entry on `side`.
    ///
    /// A long entry takes profit above and stops out below; a short entry is
    /// the mirror image. With the default 20% / 5% this gives
    /// `1.20 / 0.95` for buys and `0.80 / 1.05` for sells.
    pub fn for_entry(side: OrderSide, last_price: f64, take_profit_pct: f64, stop_loss_pct: f64) -> Self {
        match side {
            OrderSide::Buy => Self {
                take_profit_price: last_price * (1.0 + take_profit_pct),
                stop_loss_price: last_price * (1.0 - stop_loss_pct),
            },
            OrderSide::Sell => Self {
                take_profit_price: last_price * (1.0 - take_profit_pct),
                stop_loss_price: last_price * (1.0 + stop_loss_pct),
            },
        }
    }
}

/// An order as constructed by the decision engine. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub quantity: u64,
    pub side: OrderSide,
    pub order_type: OrderKind,
    pub take_profit_price: Option<f64>,
    pub stop_loss_price: Option<f64>,
}

impl Order {
    pub fn market(symbol: impl Into<String>, quantity: u64, side: OrderSide) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            side,
            order_type: OrderKind::Market,
            take_profit_price: None,
            stop_loss_price: None,
        }
    }

    pub fn bracket(
        symbol: impl Into<String>,
        quantity: u64,
        side: OrderSide,
        levels: BracketLevels,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            side,
            order_type: OrderKind::Bracket,
            take_profit_price: Some(levels.take_profit_price),
            stop_loss_price: Some(levels.stop_loss_price),
        }
    }

    /// Attached exit levels, present only on bracket orders.
    pub fn bracket_levels(&self) -> Option<BracketLevels> {
        match (self.take_profit_price, self.stop_loss_price) {
            (Some(take_profit_price), Some(stop_loss_price)) => Some(BracketLevels {
                take_profit_price,
                stop_loss_price,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} x{}",
            self.order_type, self.side, self.symbol, self.quantity
        )?;
        if let Some(levels) = self.bracket_levels() {
            write!(
                f,
                " (tp {:.2}, sl {:.2})",
                levels.take_profit_price, levels.stop_loss_price
            )?;
        }
        Ok(())
    }
}

/// An order registered with a broker but not yet submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderHandle {
    pub id: OrderId,
    pub order: Order,
}

/// Broker-side status reported on a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    /// Accepted and resting at the broker.
    Accepted,
    /// Filled in full.
    Filled,
}

/// Acknowledgement of a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionAck {
    pub order_id: OrderId,
    pub status: AckStatus,
    pub fill_price: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_bracket_levels() {
        let levels = BracketLevels::for_entry(OrderSide::Buy, 100.0, 0.20, 0.05);
        assert!((levels.take_profit_price - 120.0).abs() < 1e-9);
        assert!((levels.stop_loss_price - 95.0).abs() < 1e-9);
    }

    #[test]
    fn sell_bracket_levels_mirror_buy() {
        let levels = BracketLevels::for_entry(OrderSide::Sell, 100.0, 0.20, 0.05);
        assert!((levels.take_profit_price - 80.0).abs() < 1e-9);
        assert!((levels.stop_loss_price - 105.0).abs() < 1e-9);
    }

    #[test]
    fn market_order_has_no_levels() {
        let order = Order::market("SPY", 13, OrderSide::Buy);
        assert_eq!(order.order_type, OrderKind::Market);
        assert!(order.bracket_levels().is_none());
        assert_eq!(order.to_string(), "market buy SPY x13");
    }

    #[test]
    fn bracket_order_carries_levels() {
        let levels = BracketLevels::for_entry(OrderSide::Sell, 400.0, 0.20, 0.05);
        let order = Order::bracket("SPY", 5, OrderSide::Sell, levels);
        assert_eq!(order.bracket_levels(), Some(levels));
        assert_eq!(order.to_string(), "bracket sell SPY x5 (tp 320.00, sl 420.00)");
    }

    #[test]
    fn order_kind_parses_lowercase() {
        let kind: OrderKind = serde_json::from_str("\"bracket\"").unwrap();
        assert_eq!(kind, OrderKind::Bracket);
        assert_eq!(OrderKind::default(), OrderKind::Market);
    }
}
