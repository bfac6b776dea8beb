//! Buy/sell/flatten state machine.

pub mod engine;
pub mod state;

pub use engine::{Decision, DecisionEngine, NoActionReason};
pub use state::{LastTrade, PositionState, StrategyState};
