//! Yahoo Finance daily bars.
//!
//! Reads the v8 chart API. Transient failures are retried with doubling
//! delays; every outcome is reported to a shared circuit breaker so that a
//! block (HTTP 403) stops all further requests. Yahoo has no official API and
//! changes format without notice; the CSV provider is the fallback.

use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::blocking::Response;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataProvider, DataSource, FetchResult, RawBar};

const CHART_ENDPOINT: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct Envelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<Series>>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct Series {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

fn format_changed(reason: impl Into<String>) -> DataError {
    DataError::ResponseFormatChanged(reason.into())
}

fn at<T: Copy>(column: &[Option<T>], i: usize) -> Option<T> {
    column.get(i).copied().flatten()
}

impl Chart {
    fn into_series(self, symbol: &str) -> Result<Series, DataError> {
        match (self.result, self.error) {
            (Some(series), _) => series
                .into_iter()
                .next()
                .ok_or_else(|| format_changed("chart result is empty")),
            (None, Some(err)) if err.code == "Not Found" => Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            }),
            (None, Some(err)) => Err(format_changed(format!("{}: {}", err.code, err.description))),
            (None, None) => Err(format_changed("chart has neither result nor error")),
        }
    }
}

impl Series {
    /// One `RawBar` per timestamp that carries any price. Holiday
    /// placeholders (all prices null) are skipped; partial rows keep NaN
    /// for the missing fields and are dropped later by validation.
    fn into_raw_bars(self) -> Result<Vec<RawBar>, DataError> {
        let mut quotes = self.indicators.quote.into_iter();
        let quote = quotes.next().ok_or_else(|| format_changed("no quote block"))?;
        let adjusted = self
            .indicators
            .adjclose
            .into_iter()
            .next()
            .map(|a| a.adjclose)
            .unwrap_or_default();

        let mut bars = Vec::with_capacity(self.timestamp.len());
        for (i, ts) in self.timestamp.into_iter().enumerate() {
            let prices = [
                at(&quote.open, i),
                at(&quote.high, i),
                at(&quote.low, i),
                at(&quote.close, i),
            ];
            if prices.iter().all(Option::is_none) {
                continue;
            }
            let date = DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| format_changed(format!("timestamp {ts} out of range")))?;
            let [open, high, low, close] = prices.map(|p| p.unwrap_or(f64::NAN));
            bars.push(RawBar {
                date,
                open,
                high,
                low,
                close,
                volume: at(&quote.volume, i).unwrap_or(0),
                adj_close: at(&adjusted, i).unwrap_or(close),
            });
        }
        Ok(bars)
    }
}

/// How one HTTP attempt ended, short of a parsed body.
enum Attempt {
    Body(Response),
    Retry(DataError),
    Fail(DataError),
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) sentitrade")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    /// Chart URL covering `start 00:00:00` through `end 23:59:59` UTC.
    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let from = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let to = end.and_time(NaiveTime::MIN).and_utc().timestamp() + 86_399;
        format!("{CHART_ENDPOINT}/{symbol}?period1={from}&period2={to}&interval=1d&includeAdjustedClose=true")
    }

    fn parse_chart(symbol: &str, envelope: Envelope) -> Result<Vec<RawBar>, DataError> {
        let bars = envelope.chart.into_series(symbol)?.into_raw_bars()?;
        if bars.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1 << attempt.saturating_sub(1).min(16))
    }

    fn attempt(&self, url: &str, symbol: &str) -> Attempt {
        let resp = match self.client.get(url).send() {
            Ok(resp) => resp,
            Err(e) if e.is_connect() || e.is_timeout() => {
                return Attempt::Retry(DataError::NetworkUnreachable(e.to_string()))
            }
            Err(e) => return Attempt::Fail(DataError::NetworkUnreachable(e.to_string())),
        };

        match resp.status() {
            s if s.is_success() => Attempt::Body(resp),
            StatusCode::FORBIDDEN => {
                self.circuit_breaker.trip();
                Attempt::Fail(DataError::CircuitBreakerTripped)
            }
            StatusCode::UNAUTHORIZED => Attempt::Fail(DataError::AuthenticationRequired(
                "Yahoo Finance requires authentication".into(),
            )),
            StatusCode::TOO_MANY_REQUESTS => {
                self.circuit_breaker.record_failure();
                let retry_after_secs = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                Attempt::Retry(DataError::RateLimited { retry_after_secs })
            }
            status => {
                self.circuit_breaker.record_failure();
                Attempt::Retry(DataError::Other(format!("HTTP {status} for {symbol}")))
            }
        }
    }

    fn download(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<RawBar>, DataError> {
        let url = Self::chart_url(symbol, start, end);
        let mut last_error = DataError::Other("no attempts made".into());

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.delay_before(attempt);
                tracing::debug!(symbol, attempt, delay_ms = delay.as_millis() as u64, error = %last_error, "retrying yahoo request");
                std::thread::sleep(delay);
            }
            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }
            match self.attempt(&url, symbol) {
                Attempt::Body(resp) => {
                    let envelope: Envelope = resp
                        .json()
                        .map_err(|e| format_changed(format!("unreadable chart for {symbol}: {e}")))?;
                    let bars = Self::parse_chart(symbol, envelope)?;
                    self.circuit_breaker.record_success();
                    return Ok(bars);
                }
                Attempt::Retry(e) => last_error = e,
                Attempt::Fail(e) => return Err(e),
            }
        }
        Err(last_error)
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<FetchResult, DataError> {
        let bars = self.download(symbol, start, end)?;
        tracing::debug!(symbol, bars = bars.len(), "fetched yahoo bars");
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::YahooFinance,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Vec<RawBar>, DataError> {
        YahooProvider::parse_chart("SPY", serde_json::from_str(json).unwrap())
    }

    #[test]
    fn holiday_rows_are_skipped_and_adjclose_falls_back() {
        let bars = parse(
            r#"{"chart":{"result":[{
                "timestamp":[1704205800,1704292200,1704378600],
                "indicators":{
                    "quote":[{
                        "open":[470.0,null,468.0],
                        "high":[473.5,null,470.1],
                        "low":[468.2,null,466.9],
                        "close":[472.6,null,467.3],
                        "volume":[80000000,null,70000000]
                    }],
                    "adjclose":[{"adjclose":[470.1,null,null]}]
                }
            }],"error":null}}"#,
        )
        .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].adj_close, 470.1);
        assert_eq!(bars[1].adj_close, 467.3);
    }

    #[test]
    fn partial_row_keeps_nan() {
        let bars = parse(
            r#"{"chart":{"result":[{
                "timestamp":[1704205800],
                "indicators":{"quote":[{"open":[null],"high":[1.0],"low":[1.0],"close":[1.0],"volume":[null]}]}
            }]}}"#,
        )
        .unwrap();
        assert!(bars[0].open.is_nan());
        assert_eq!(bars[0].volume, 0);
    }

    #[test]
    fn not_found_maps_to_symbol_error() {
        let err = parse(
            r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DataError::SymbolNotFound { .. }));
    }

    #[test]
    fn missing_quote_block_is_a_format_change() {
        let err = parse(r#"{"chart":{"result":[{"timestamp":[1],"indicators":{}}]}}"#).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn url_spans_whole_end_day() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let url = YahooProvider::chart_url("SPY", day, day);
        assert!(url.contains("period1=1704067200"));
        assert!(url.contains("period2=1704153599"));
    }

    #[test]
    fn backoff_doubles() {
        let provider = YahooProvider::new(Arc::new(CircuitBreaker::default_provider()))
            .unwrap()
            .with_retries(3, Duration::from_millis(100));
        assert_eq!(provider.delay_before(1), Duration::from_millis(100));
        assert_eq!(provider.delay_before(2), Duration::from_millis(200));
        assert_eq!(provider.delay_before(3), Duration::from_millis(400));
    }
}
