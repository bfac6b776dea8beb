//! News sources.
//!
//! Every source returns typed `NewsEvent`s for one symbol over an inclusive
//! date range. Raw payloads are validated here; a malformed event fails the
//! fetch with `NewsError::Malformed` instead of reaching the strategy.

pub mod alpaca;
pub mod file;

use chrono::NaiveDate;
use thiserror::Error;

use crate::credentials::CredentialsError;
use crate::domain::{MalformedEvent, NewsEvent, RawNewsEvent};

pub use alpaca::AlpacaNewsClient;
pub use file::FileNewsSource;

#[derive(Debug, Error)]
pub enum NewsError {
    #[error("malformed news event: {0}")]
    Malformed(#[from] MalformedEvent),

    #[error("news request failed: {0}")]
    Request(String),

    #[error("news provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse news payload: {0}")]
    Parse(String),

    #[error("news i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Credentials(#[from] CredentialsError),
}

pub trait NewsSource: Send + Sync {
    fn name(&self) -> &str;

    /// Events for `symbol` published between `start` and `end`, both inclusive.
    fn news(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<NewsEvent>, NewsError>;
}

/// Validate a batch of raw payloads. The first malformed event fails the batch.
pub fn parse_events<I>(raws: I) -> Result<Vec<NewsEvent>, NewsError>
where
    I: IntoIterator<Item = RawNewsEvent>,
{
    raws.into_iter()
        .map(|raw| NewsEvent::try_from(raw).map_err(NewsError::from))
        .collect()
}

/// Whether `event` belongs to `symbol` and falls inside `[start, end]`.
///
/// Events without symbols apply to every symbol; events without a timestamp
/// apply to every date.
pub fn in_window(event: &NewsEvent, symbol: &str, start: NaiveDate, end: NaiveDate) -> bool {
    let symbol_match =
        event.symbols.is_empty() || event.symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol));
    let date_match = event.date().map_or(true, |d| d >= start && d <= end);
    symbol_match && date_match
}

/// In-memory source over a fixed set of events.
#[derive(Debug, Clone, Default)]
pub struct StaticNewsSource {
    events: Vec<NewsEvent>,
}

impl StaticNewsSource {
    pub fn new(events: Vec<NewsEvent>) -> Self {
        Self { events }
    }

    /// Undated, untagged headlines that show up in every window.
    pub fn always(headlines: &[&str]) -> Self {
        Self::new(headlines.iter().map(|h| NewsEvent::headline(*h)).collect())
    }

    pub fn events(&self) -> &[NewsEvent] {
        &self.events
    }
}

impl NewsSource for StaticNewsSource {
    fn name(&self) -> &str {
        "static"
    }

    fn news(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NewsEvent>, NewsError> {
        Ok(self
            .events
            .iter()
            .filter(|e| in_window(e, symbol, start, end))
            .cloned()
            .collect())
    }
}
