//! One strategy instance per symbol and the per-tick contract.
//!
//! A tick reads cash, price and date from the broker, pulls the trailing news
//! window, estimates sentiment, sizes the position and asks the decision
//! engine what to do. Side effects run in a fixed order (liquidate, create,
//! submit) and `last_trade` advances only once the broker acknowledges the
//! order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::broker::{Broker, BrokerError};
use crate::config::{ConfigError, StrategyConfig};
use crate::decision::{Decision, DecisionEngine, LastTrade, StrategyState};
use crate::domain::{NewsWindow, Order, SubmissionAck};
use crate::news::{NewsError, NewsSource};
use crate::sentiment::{SentimentError, SentimentEstimator, SentimentResult};
use crate::sizing::{self, PositionSizing};

/// A failed tick. State is never advanced when one of these is returned.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("market data unavailable: {0}")]
    MarketData(#[source] BrokerError),

    #[error("news fetch failed: {0}")]
    News(#[from] NewsError),

    #[error("sentiment estimation failed: {0}")]
    Sentiment(#[from] SentimentError),

    #[error("liquidating {symbol} failed: {source}")]
    Liquidation {
        symbol: String,
        #[source]
        source: BrokerError,
    },

    #[error("submitting {order} failed: {source}")]
    Submission {
        order: Order,
        #[source]
        source: BrokerError,
    },
}

/// Everything that happened on one successful tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub date: NaiveDate,
    pub symbol: String,
    pub headlines: usize,
    pub sentiment: SentimentResult,
    pub sizing: PositionSizing,
    pub decision: Decision,
    /// True when `liquidate_all` ran this tick.
    pub liquidated: bool,
    pub ack: Option<SubmissionAck>,
    pub last_trade_before: LastTrade,
    pub last_trade_after: LastTrade,
}

impl TickReport {
    pub fn submitted(&self) -> Option<&Order> {
        self.ack.as_ref().and(self.decision.order())
    }
}

/// The pure half of a tick: what the strategy would do with these inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub sentiment: SentimentResult,
    pub sizing: PositionSizing,
    pub decision: Decision,
}

#[derive(Debug)]
pub struct SentimentStrategy {
    config: StrategyConfig,
    engine: DecisionEngine,
    estimator: Arc<SentimentEstimator>,
    state: StrategyState,
}

impl SentimentStrategy {
    pub fn new(config: StrategyConfig, estimator: Arc<SentimentEstimator>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            engine: DecisionEngine::from_config(&config),
            state: StrategyState::new(config.symbol.clone(), config.cash_at_risk),
            config,
            estimator,
        })
    }

    /// Resume from a previously persisted state.
    pub fn with_state(mut self, last_trade: LastTrade) -> Self {
        self.state.last_trade = last_trade;
        self
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn state(&self) -> &StrategyState {
        &self.state
    }

    pub fn symbol(&self) -> &str {
        &self.state.symbol
    }

    /// Trailing window ending `today`, headlines in source order.
    pub fn news_window(
        &self,
        news: &dyn NewsSource,
        today: NaiveDate,
    ) -> Result<NewsWindow, NewsError> {
        let window = NewsWindow::lookback(self.symbol(), today, self.config.news_lookback_days);
        let events = news.news(self.symbol(), window.start_date, window.end_date)?;
        Ok(window.with_events(&events))
    }

    /// Sizing for this tick. A degenerate price is logged and sized to zero.
    pub fn size(&self, cash: f64, last_price: f64) -> PositionSizing {
        match sizing::size(cash, last_price, self.state.cash_at_risk) {
            Ok(sizing) => sizing,
            Err(e) => {
                tracing::warn!(symbol = %self.symbol(), cash, last_price, error = %e, "sizing skipped");
                PositionSizing::degenerate(cash, last_price)
            }
        }
    }

    /// Run sentiment, sizing and the decision engine without touching the broker.
    ///
    /// Calling this twice with the same inputs and state yields the same result.
    pub fn evaluate(
        &self,
        cash: f64,
        last_price: f64,
        headlines: &[String],
    ) -> Result<Evaluation, SentimentError> {
        let sizing = self.size(cash, last_price);
        let sentiment = self.estimator.estimate(headlines)?;
        let decision = self.engine.decide(&self.state, &sizing, &sentiment);
        Ok(Evaluation {
            sentiment,
            sizing,
            decision,
        })
    }

    /// Evaluate one tick against `broker` and `news`, then apply the decision.
    pub fn on_tick<B>(&mut self, broker: &mut B, news: &dyn NewsSource) -> Result<TickReport, TickError>
    where
        B: Broker + ?Sized,
    {
        let symbol = self.state.symbol.clone();
        let date = broker.current_date().map_err(TickError::MarketData)?;
        let cash = broker.cash().map_err(TickError::MarketData)?;
        let last_price = broker.last_price(&symbol).map_err(TickError::MarketData)?;

        let window = self.news_window(news, date)?;
        let Evaluation {
            sentiment,
            sizing,
            decision,
        } = self.evaluate(cash, last_price, &window.headlines)?;

        let before = self.state.last_trade;
        let ack = self.apply(broker, &decision)?;
        if ack.is_some() {
            self.state.last_trade = decision.committed_state(before);
        }

        let report = TickReport {
            date,
            symbol,
            headlines: window.headlines.len(),
            sentiment,
            sizing,
            liquidated: decision.flattens(),
            ack,
            decision,
            last_trade_before: before,
            last_trade_after: self.state.last_trade,
        };
        tracing::info!(
            date = %report.date,
            symbol = %report.symbol,
            headlines = report.headlines,
            label = %report.sentiment.label,
            confidence = report.sentiment.confidence,
            quantity = report.sizing.quantity,
            decision = %report.decision,
            last_trade = %report.last_trade_after,
            "tick"
        );
        Ok(report)
    }

    fn apply<B>(&self, broker: &mut B, decision: &Decision) -> Result<Option<SubmissionAck>, TickError>
    where
        B: Broker + ?Sized,
    {
        if decision.flattens() {
            broker
                .liquidate_all(&self.state.symbol)
                .map_err(|source| TickError::Liquidation {
                    symbol: self.state.symbol.clone(),
                    source,
                })?;
        }
        let Some(order) = decision.order() else {
            return Ok(None);
        };
        let submission_failed = |source: BrokerError| TickError::Submission {
            order: order.clone(),
            source,
        };
        let handle = broker.create_order(order.clone()).map_err(submission_failed)?;
        let ack = broker.submit_order(&handle).map_err(submission_failed)?;
        Ok(Some(ack))
    }
}
