//! SentiTrade Core: news sentiment in, orders out.
//!
//! This crate contains the strategy and its collaborator seams:
//! - Domain types (bars, news events, orders, acknowledgements)
//! - Sentiment estimator (tokenizer + model, sum-then-softmax aggregation)
//! - Position sizer and the buy/sell/flatten decision engine
//! - The per-tick strategy contract over `Broker` and `NewsSource`
//! - Adapters: Yahoo/CSV/synthetic bars, Alpaca and file news, Alpaca trading

pub mod broker;
pub mod config;
pub mod credentials;
pub mod data;
pub mod decision;
pub mod domain;
pub mod news;
pub mod sentiment;
pub mod sizing;
pub mod strategy;

pub use config::{ConfigError, StrategyConfig};
pub use strategy::{Evaluation, SentimentStrategy, TickError, TickReport};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: anything the runner shares across rayon workers
    /// is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Order>();
        require_sync::<domain::Order>();
        require_send::<domain::NewsEvent>();
        require_sync::<domain::NewsEvent>();

        require_send::<sentiment::SentimentEstimator>();
        require_sync::<sentiment::SentimentEstimator>();
        require_send::<StrategyConfig>();
        require_sync::<StrategyConfig>();
        require_send::<SentimentStrategy>();
        require_send::<TickReport>();

        require_send::<news::FileNewsSource>();
        require_sync::<news::FileNewsSource>();
        require_send::<data::CsvProvider>();
        require_sync::<data::CsvProvider>();
    }

    /// The decision step must not see the broker: it takes plain values only.
    #[test]
    fn decide_is_broker_free() {
        fn _check(
            engine: &decision::DecisionEngine,
            state: &decision::StrategyState,
            sizing: &sizing::PositionSizing,
            sentiment: &sentiment::SentimentResult,
        ) -> decision::Decision {
            engine.decide(state, sizing, sentiment)
        }
    }
}
