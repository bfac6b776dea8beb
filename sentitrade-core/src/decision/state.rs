//! Strategy state carried across ticks.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::OrderSide;

/// Direction of the last committed trade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LastTrade {
    #[default]
    None,
    Buy,
    Sell,
}

impl LastTrade {
    pub fn position(self) -> PositionState {
        match self {
            Self::None => PositionState::NoPosition,
            Self::Buy => PositionState::HoldingLong,
            Self::Sell => PositionState::HoldingShort,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl From<OrderSide> for LastTrade {
    fn from(side: OrderSide) -> Self {
        match side {
            OrderSide::Buy => Self::Buy,
            OrderSide::Sell => Self::Sell,
        }
    }
}

impl fmt::Display for LastTrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position view of `LastTrade`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    NoPosition,
    HoldingLong,
    HoldingShort,
}

impl PositionState {
    /// The position a new entry on `side` would have to reverse.
    pub fn opposes(self, side: OrderSide) -> bool {
        matches!(
            (self, side),
            (Self::HoldingShort, OrderSide::Buy) | (Self::HoldingLong, OrderSide::Sell)
        )
    }
}

/// The only state that outlives a tick.
///
/// One instance per symbol; nothing else reads or writes `last_trade`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyState {
    pub symbol: String,
    pub cash_at_risk: f64,
    pub last_trade: LastTrade,
}

impl StrategyState {
    pub fn new(symbol: impl Into<String>, cash_at_risk: f64) -> Self {
        Self {
            symbol: symbol.into(),
            cash_at_risk,
            last_trade: LastTrade::None,
        }
    }

    pub fn with_last_trade(mut self, last_trade: LastTrade) -> Self {
        self.last_trade = last_trade;
        self
    }

    pub fn position(&self) -> PositionState {
        self.last_trade.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_trade_maps_to_position() {
        assert_eq!(LastTrade::None.position(), PositionState::NoPosition);
        assert_eq!(LastTrade::Buy.position(), PositionState::HoldingLong);
        assert_eq!(LastTrade::Sell.position(), PositionState::HoldingShort);
    }

    #[test]
    fn only_opposite_positions_oppose() {
        assert!(PositionState::HoldingShort.opposes(OrderSide::Buy));
        assert!(PositionState::HoldingLong.opposes(OrderSide::Sell));
        assert!(!PositionState::HoldingLong.opposes(OrderSide::Buy));
        assert!(!PositionState::NoPosition.opposes(OrderSide::Buy));
        assert!(!PositionState::NoPosition.opposes(OrderSide::Sell));
    }

    #[test]
    fn new_state_has_no_position() {
        let state = StrategyState::new("SPY", 0.5);
        assert_eq!(state.last_trade, LastTrade::None);
        assert_eq!(state.position(), PositionState::NoPosition);
    }
}
