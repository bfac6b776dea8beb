//! Position sizing: cash at risk translated into a share quantity.
//!
//! `quantity = round(cash * cash_at_risk / last_price)`
//!
//! Rounding is half-up: `12.5 → 13`, `12.4 → 12`. Quantities are never
//! negative; a negative cash balance sizes to zero.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inputs and result of one sizing call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSizing {
    pub cash: f64,
    pub last_price: f64,
    pub quantity: u64,
}

impl PositionSizing {
    /// Sizing with quantity forced to zero (degenerate price).
    pub fn degenerate(cash: f64, last_price: f64) -> Self {
        Self {
            cash,
            last_price,
            quantity: 0,
        }
    }

    /// True when the account can afford at least one share at `last_price`.
    pub fn has_capital(&self) -> bool {
        self.cash > self.last_price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SizingError {
    #[error("last price must be positive, got {0}")]
    NonPositivePrice(f64),

    #[error("cash at risk must be in (0, 1], got {0}")]
    InvalidCashAtRisk(f64),
}

/// Round half up, as used for share quantities.
///
/// `f64::round` rounds half away from zero, which is half-up for the
/// non-negative ratios sized here.
pub fn round_half_up(x: f64) -> f64 {
    x.round()
}

/// Size a position from available cash, last price, and the risk fraction.
pub fn size(cash: f64, last_price: f64, cash_at_risk: f64) -> Result<PositionSizing, SizingError> {
    if !(last_price.is_finite() && last_price > 0.0) {
        return Err(SizingError::NonPositivePrice(last_price));
    }
    if !(cash_at_risk > 0.0 && cash_at_risk <= 1.0) {
        return Err(SizingError::InvalidCashAtRisk(cash_at_risk));
    }
    let raw = round_half_up(cash * cash_at_risk / last_price);
    let quantity = if raw.is_finite() && raw > 0.0 {
        raw as u64
    } else {
        0
    };
    Ok(PositionSizing {
        cash,
        last_price,
        quantity,
    })
}
