//! The per-tick transition function.
//!
//! `decide` is pure: it reads the state, the sizing and the sentiment and
//! returns what should happen. Nothing is committed here. The caller applies
//! side effects and advances `last_trade` only after the broker acknowledges
//! the order (see `Decision::committed_state`), so replaying the same inputs
//! after a failed submission yields the same decision.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::state::{LastTrade, StrategyState};
use crate::config::StrategyConfig;
use crate::domain::{BracketLevels, Order, OrderKind, OrderSide};
use crate::sentiment::{SentimentLabel, SentimentResult};
use crate::sizing::PositionSizing;

/// Why a tick produced no order and no flatten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoActionReason {
    /// `cash <= last_price`.
    InsufficientCapital,
    /// Neutral label.
    NeutralSignal,
    /// Directional label at or below the confidence threshold.
    WeakSignal,
    /// Confident signal, no opposing position, but sized to zero shares.
    ZeroQuantity,
}

impl NoActionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsufficientCapital => "insufficient_capital",
            Self::NeutralSignal => "neutral_signal",
            Self::WeakSignal => "weak_signal",
            Self::ZeroQuantity => "zero_quantity",
        }
    }
}

/// Outcome of one evaluation of the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    NoAction { reason: NoActionReason },
    /// Reversal signal sized to zero shares: close the opposite position, enter nothing.
    FlattenOnly { signal: OrderSide },
    /// Submit `order`, closing the opposite position first when `flatten_first`.
    Trade { flatten_first: bool, order: Order },
}

impl Decision {
    pub fn no_action(reason: NoActionReason) -> Self {
        Self::NoAction { reason }
    }

    /// True when the symbol must be liquidated before anything else.
    pub fn flattens(&self) -> bool {
        match self {
            Self::NoAction { .. } => false,
            Self::FlattenOnly { .. } => true,
            Self::Trade { flatten_first, .. } => *flatten_first,
        }
    }

    pub fn order(&self) -> Option<&Order> {
        match self {
            Self::Trade { order, .. } => Some(order),
            _ => None,
        }
    }

    pub fn is_no_action(&self) -> bool {
        matches!(self, Self::NoAction { .. })
    }

    /// `last_trade` once this decision's order has been acknowledged.
    ///
    /// Decisions without an order leave the state as it was, including
    /// `FlattenOnly`.
    pub fn committed_state(&self, current: LastTrade) -> LastTrade {
        match self {
            Self::Trade { order, .. } => LastTrade::from(order.side),
            _ => current,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAction { reason } => write!(f, "no action ({})", reason.as_str()),
            Self::FlattenOnly { signal } => write!(f, "flatten only ({signal} signal, zero quantity)"),
            Self::Trade {
                flatten_first: true,
                order,
            } => write!(f, "flatten then {order}"),
            Self::Trade {
                flatten_first: false,
                order,
            } => write!(f, "{order}"),
        }
    }
}

/// Sentiment + sizing → decision, parameterized by threshold and order shape.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionEngine {
    confidence_threshold: f64,
    order_type: OrderKind,
    take_profit_pct: f64,
    stop_loss_pct: f64,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::from_config(&StrategyConfig::default())
    }
}

impl DecisionEngine {
    pub fn from_config(config: &StrategyConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            order_type: config.order_type,
            take_profit_pct: config.take_profit_pct,
            stop_loss_pct: config.stop_loss_pct,
        }
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    pub fn order_type(&self) -> OrderKind {
        self.order_type
    }

    pub fn decide(
        &self,
        state: &StrategyState,
        sizing: &PositionSizing,
        sentiment: &SentimentResult,
    ) -> Decision {
        if !sizing.has_capital() {
            return Decision::no_action(NoActionReason::InsufficientCapital);
        }
        let side = match sentiment.label {
            SentimentLabel::Positive => OrderSide::Buy,
            SentimentLabel::Negative => OrderSide::Sell,
            SentimentLabel::Neutral => return Decision::no_action(NoActionReason::NeutralSignal),
        };
        // Strict: confidence equal to the threshold never trades (NaN never trades either).
        if !(sentiment.confidence > self.confidence_threshold) {
            return Decision::no_action(NoActionReason::WeakSignal);
        }

        let flatten_first = state.position().opposes(side);
        if sizing.quantity == 0 {
            return if flatten_first {
                Decision::FlattenOnly { signal: side }
            } else {
                Decision::no_action(NoActionReason::ZeroQuantity)
            };
        }

        Decision::Trade {
            flatten_first,
            order: self.build_order(&state.symbol, sizing, side),
        }
    }

    fn build_order(&self, symbol: &str, sizing: &PositionSizing, side: OrderSide) -> Order {
        match self.order_type {
            OrderKind::Market => Order::market(symbol, sizing.quantity, side),
            OrderKind::Bracket => {
                let levels = BracketLevels::for_entry(
                    side,
                    sizing.last_price,
                    self.take_profit_pct,
                    self.stop_loss_pct,
                );
                Order::bracket(symbol, sizing.quantity, side, levels)
            }
        }
    }
}
