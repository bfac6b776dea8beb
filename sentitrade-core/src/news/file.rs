//! File-backed news for offline backtests.
//!
//! Accepts a JSON array of events, an object with a `news` array (the Alpaca
//! response shape), or JSON Lines. Loaded and validated once at construction.
//! A file that is one JSON document reports the document's own parse error;
//! only JSON Lines errors carry a line number.

use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::{in_window, parse_events, NewsError, NewsSource};
use crate::domain::{NewsEvent, RawNewsEvent};

#[derive(Deserialize)]
struct NewsPage {
    news: Vec<RawNewsEvent>,
}

/// True when `text` is exactly one JSON object with a `news` key.
fn is_news_page(text: &str) -> bool {
    let mut values = serde_json::Deserializer::from_str(text).into_iter::<serde_json::Value>();
    match (values.next(), values.next()) {
        (Some(Ok(serde_json::Value::Object(map))), None) => map.contains_key("news"),
        _ => false,
    }
}

fn document_error(e: serde_json::Error) -> NewsError {
    NewsError::Parse(format!("news document: {e}"))
}

#[derive(Debug, Clone)]
pub struct FileNewsSource {
    path: PathBuf,
    events: Vec<NewsEvent>,
}

impl FileNewsSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, NewsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let events = Self::parse(&text)?;
        tracing::debug!(path = %path.display(), events = events.len(), "loaded news file");
        Ok(Self {
            path: path.to_path_buf(),
            events,
        })
    }

    pub fn parse(text: &str) -> Result<Vec<NewsEvent>, NewsError> {
        let body = text.trim_start();
        let raws = if body.starts_with('[') {
            serde_json::from_str::<Vec<RawNewsEvent>>(body).map_err(document_error)?
        } else if is_news_page(body) {
            serde_json::from_str::<NewsPage>(body).map_err(document_error)?.news
        } else {
            text.lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(i, line)| {
                    serde_json::from_str::<RawNewsEvent>(line)
                        .map_err(|e| NewsError::Parse(format!("line {}: {e}", i + 1)))
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        parse_events(raws)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl NewsSource for FileNewsSource {
    fn name(&self) -> &str {
        "file"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MalformedEvent;

    #[test]
    fn parses_json_array() {
        let events = FileNewsSource::parse(
            r#"[{"headline": "a", "symbols": ["SPY"], "created_at": "2024-03-01T10:00:00Z"},
                {"headline": "b"}]"#,
        )
        .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].headline, "b");
    }

    #[test]
    fn parses_alpaca_page_shape() {
        let events = FileNewsSource::parse(
            r#"{"news": [{"id": 1, "headline": "x", "author": "a", "url": "u"}], "next_page_token": null}"#,
        )
        .unwrap();
        assert_eq!(events[0].id, Some(1));
    }

    #[test]
    fn parses_json_lines() {
        let events = FileNewsSource::parse(
            "{\"headline\": \"one\"}\n\n{\"headline\": \"two\", \"symbols\": [\"SPY\"]}\n",
        )
        .unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn bad_line_reports_line_number() {
        let err = FileNewsSource::parse("{\"headline\": \"one\"}\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn wrong_field_type_in_array_reports_document_error() {
        let err = FileNewsSource::parse(r#"[{"headline": "a"}, {"headline": 5}]"#).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("news document"), "{message}");
        assert!(message.contains("invalid type"), "{message}");
        assert!(!message.contains("line 1:"), "{message}");
    }

    #[test]
    fn wrong_field_type_in_page_reports_document_error() {
        let err = FileNewsSource::parse("{\"news\": [\n  {\"id\": \"seven\", \"headline\": \"x\"}\n]}").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("news document"), "{message}");
        assert!(message.contains("invalid type"), "{message}");
    }

    #[test]
    fn single_json_line_is_one_event() {
        let events = FileNewsSource::parse("{\"headline\": \"only\"}").unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn blank_headline_fails_load() {
        let err = FileNewsSource::parse(r#"[{"id": 4, "headline": " "}]"#).unwrap_err();
        assert!(matches!(
            err,
            NewsError::Malformed(MalformedEvent::BlankHeadline { id: Some(4) })
        ));
    }

    #[test]
    fn open_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.jsonl");
        std::fs::write(&path, "{\"headline\": \"stocks surge\"}\n").unwrap();
        let source = FileNewsSource::open(&path).unwrap();
        assert_eq!(source.len(), 1);
        assert_eq!(source.path(), path.as_path());
    }
}
