//! Domain types for SentiTrade

pub mod bar;
pub mod ids;
pub mod news;
pub mod order;

pub use bar::Bar;
pub use ids::OrderId;
pub use news::{MalformedEvent, NewsEvent, NewsWindow, RawNewsEvent};
pub use order::{AckStatus, BracketLevels, Order, OrderHandle, OrderKind, OrderSide, SubmissionAck};
