//! Brokerage seams.
//!
//! The strategy reads account state through `MarketData` and acts through
//! `OrderExecution`. A `Broker` is anything that does both.

pub mod alpaca;

use chrono::NaiveDate;
use thiserror::Error;

use crate::credentials::CredentialsError;
use crate::domain::{Order, OrderHandle, OrderId, SubmissionAck};

pub use alpaca::AlpacaBroker;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker request failed: {0}")]
    Request(String),

    #[error("broker returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse broker response: {0}")]
    Parse(String),

    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("unknown order {0}")]
    UnknownOrder(OrderId),

    #[error("no price available for {symbol}")]
    NoPrice { symbol: String },

    #[error(transparent)]
    Credentials(#[from] CredentialsError),
}

/// Account and quote reads.
pub trait MarketData {
    fn cash(&self) -> Result<f64, BrokerError>;
    fn last_price(&self, symbol: &str) -> Result<f64, BrokerError>;
    fn current_date(&self) -> Result<NaiveDate, BrokerError>;
}

/// Order lifecycle: register, submit, and flatten.
pub trait OrderExecution {
    fn create_order(&mut self, order: Order) -> Result<OrderHandle, BrokerError>;
    fn submit_order(&mut self, handle: &OrderHandle) -> Result<SubmissionAck, BrokerError>;
    /// Close every open position in `symbol`. A flat symbol is not an error.
    fn liquidate_all(&mut self, symbol: &str) -> Result<(), BrokerError>;
}

pub trait Broker: MarketData + OrderExecution {}

impl<T: MarketData + OrderExecution + ?Sized> Broker for T {}
