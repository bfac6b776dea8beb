//! News events and the trailing news window evaluated each tick.
//!
//! Raw provider payloads are parsed into `NewsEvent` at the collaborator
//! boundary. Events without a usable headline are rejected there, so the
//! strategy only ever sees clean headline strings.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider payload as it arrives on the wire. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNewsEvent {
    pub id: Option<u64>,
    pub headline: Option<String>,
    pub summary: Option<String>,
    pub source: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub symbols: Vec<String>,
}

/// Why a raw payload could not become a `NewsEvent`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEvent {
    #[error("news event {id:?} has no headline")]
    MissingHeadline { id: Option<u64> },

    #[error("news event {id:?} has a blank headline")]
    BlankHeadline { id: Option<u64> },
}

/// A validated news event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsEvent {
    pub id: Option<u64>,
    pub headline: String,
    pub summary: Option<String>,
    pub source: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub symbols: Vec<String>,
}

impl NewsEvent {
    /// Minimal event carrying only a headline.
    pub fn headline(headline: impl Into<String>) -> Self {
        Self {
            id: None,
            headline: headline.into(),
            summary: None,
            source: None,
            created_at: None,
            symbols: Vec::new(),
        }
    }

    /// Calendar date the event was published, if the provider reported one.
    pub fn date(&self) -> Option<NaiveDate> {
        self.created_at.map(|ts| ts.date_naive())
    }
}

impl TryFrom<RawNewsEvent> for NewsEvent {
    type Error = MalformedEvent;

    fn try_from(raw: RawNewsEvent) -> Result<Self, Self::Error> {
        let headline = raw
            .headline
            .ok_or(MalformedEvent::MissingHeadline { id: raw.id })?;
        let headline = headline.trim();
        if headline.is_empty() {
            return Err(MalformedEvent::BlankHeadline { id: raw.id });
        }
        Ok(Self {
            id: raw.id,
            headline: headline.to_string(),
            summary: raw.summary,
            source: raw.source,
            created_at: raw.created_at,
            symbols: raw.symbols,
        })
    }
}

/// Headlines for one symbol over the trailing lookback ending today (inclusive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsWindow {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub headlines: Vec<String>,
}

impl NewsWindow {
    /// Empty window spanning `[today - lookback_days, today]`.
    pub fn lookback(symbol: impl Into<String>, today: NaiveDate, lookback_days: u32) -> Self {
        Self {
            symbol: symbol.into(),
            start_date: today - Duration::days(i64::from(lookback_days)),
            end_date: today,
            headlines: Vec::new(),
        }
    }

    pub fn with_events(mut self, events: &[NewsEvent]) -> Self {
        self.headlines = events.iter().map(|e| e.headline.clone()).collect();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.headlines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn three_day_lookback_spans_calendar_days() {
        let window = NewsWindow::lookback("SPY", date(2024, 3, 4), 3);
        assert_eq!(window.start_date, date(2024, 3, 1));
        assert_eq!(window.end_date, date(2024, 3, 4));
        assert!(window.is_empty());
    }

    #[test]
    fn window_keeps_event_order() {
        let events = vec![NewsEvent::headline("first"), NewsEvent::headline("second")];
        let window = NewsWindow::lookback("SPY", date(2024, 3, 4), 3).with_events(&events);
        assert_eq!(window.headlines, vec!["first", "second"]);
    }

    #[test]
    fn raw_event_with_headline_parses() {
        let raw: RawNewsEvent = serde_json::from_str(
            r#"{"id": 7, "headline": "  Stocks rally on earnings  ", "symbols": ["SPY"],
                "created_at": "2024-03-01T14:30:00Z", "url": "https://example.com"}"#,
        )
        .unwrap();
        let event = NewsEvent::try_from(raw).unwrap();
        assert_eq!(event.headline, "Stocks rally on earnings");
        assert_eq!(event.symbols, vec!["SPY"]);
        assert_eq!(event.date(), Some(date(2024, 3, 1)));
    }

    #[test]
    fn missing_headline_is_rejected() {
        let raw: RawNewsEvent = serde_json::from_str(r#"{"id": 9, "summary": "x"}"#).unwrap();
        assert_eq!(
            NewsEvent::try_from(raw),
            Err(MalformedEvent::MissingHeadline { id: Some(9) })
        );
    }

    #[test]
    fn blank_headline_is_rejected() {
        let raw = RawNewsEvent {
            headline: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(
            NewsEvent::try_from(raw),
            Err(MalformedEvent::BlankHeadline { id: None })
        );
    }
}
