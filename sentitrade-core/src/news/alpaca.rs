//! Alpaca market-data news endpoint (`/v1beta1/news`).

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use std::time::Duration;

use super::{parse_events, NewsError, NewsSource};
use crate::credentials::{http_client, AlpacaCredentials, DATA_BASE_URL};
use crate::domain::{NewsEvent, RawNewsEvent};

const PAGE_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
struct NewsPage {
    #[serde(default)]
    news: Vec<RawNewsEvent>,
    next_page_token: Option<String>,
}

pub struct AlpacaNewsClient {
    client: reqwest::blocking::Client,
    credentials: AlpacaCredentials,
    base_url: String,
    max_pages: usize,
}

impl AlpacaNewsClient {
    pub fn new(credentials: AlpacaCredentials) -> Result<Self, NewsError> {
        Ok(Self {
            client: http_client(Duration::from_secs(30))?,
            credentials,
            base_url: DATA_BASE_URL.to_string(),
            max_pages: 10,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn query(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<(&'static str, String)> {
        // `end` covers the whole day so today's headlines are included.
        let start_ts = start.and_time(NaiveTime::MIN).and_utc();
        let end_ts = end.and_time(NaiveTime::MIN).and_utc() + chrono::Duration::seconds(86_399);
        vec![
            ("symbols", symbol.to_string()),
            ("start", start_ts.to_rfc3339()),
            ("end", end_ts.to_rfc3339()),
            ("limit", PAGE_LIMIT.to_string()),
            ("sort", "desc".to_string()),
        ]
    }

    fn fetch_page(
        &self,
        query: &[(&'static str, String)],
        page_token: Option<&str>,
    ) -> Result<NewsPage, NewsError> {
        let url = format!("{}/v1beta1/news", self.base_url);
        let mut request = self.client.get(&url).query(query);
        if let Some(token) = page_token {
            request = request.query(&[("page_token", token)]);
        }
        let resp = self
            .credentials
            .authorize(request)
            .send()
            .map_err(|e| NewsError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(NewsError::Status {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<NewsPage>()
            .map_err(|e| NewsError::Parse(e.to_string()))
    }
}

impl NewsSource for AlpacaNewsClient {
    fn name(&self) -> &str {
        "alpaca"
    }

    fn news(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NewsEvent>, NewsError> {
        let query = Self::query(symbol, start, end);
        let mut raws = Vec::new();
        let mut token: Option<String> = None;

        for page in 0..self.max_pages {
            let resp = self.fetch_page(&query, token.as_deref())?;
            tracing::debug!(symbol, page, events = resp.news.len(), "fetched alpaca news page");
            raws.extend(resp.news);
            match resp.next_page_token {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => break,
            }
        }
        parse_events(raws)
    }
}
