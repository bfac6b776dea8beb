//! Bar and news resolution for the runner.
//!
//! Turns the `[data]` and `[news]` config sections into concrete providers
//! and loads the bars each backtest walks over. Symbols that come back empty
//! fail the load; a backtest never starts on a partial data set.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use sentitrade_core::credentials::AlpacaCredentials;
use sentitrade_core::data::{
    CircuitBreaker, CsvProvider, DataError, DataProvider, DataSource, SyntheticProvider,
    YahooProvider,
};
use sentitrade_core::domain::Bar;
use sentitrade_core::news::{AlpacaNewsClient, FileNewsSource, NewsError, NewsSource};

use crate::config::{DataSection, DataSourceKind, NewsSection, NewsSourceKind};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to load bars for '{symbol}': {source}")]
    Data {
        symbol: String,
        #[source]
        source: DataError,
    },

    #[error("no usable bars for '{symbol}' between {start} and {end}")]
    NoBars {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("data provider '{0}' is not accepting requests")]
    Unavailable(String),

    #[error("provider setup failed: {0}")]
    Provider(#[from] DataError),

    #[error("news source setup failed: {0}")]
    News(#[from] NewsError),

    #[error("missing setting: {0}")]
    Missing(&'static str),
}

/// Bars for every requested symbol, with provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub bars: BTreeMap<String, Vec<Bar>>,
    pub source: DataSource,
    /// BLAKE3 over every bar, for fingerprinting results.
    pub dataset_hash: String,
}

impl LoadedData {
    pub fn bars_for(&self, symbol: &str) -> Option<&[Bar]> {
        self.bars.get(symbol).map(Vec::as_slice)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.bars.keys().map(String::as_str)
    }
}

pub fn provider_for(section: &DataSection) -> Result<Box<dyn DataProvider>, LoadError> {
    Ok(match section.source {
        DataSourceKind::Yahoo => Box::new(YahooProvider::new(Arc::new(
            CircuitBreaker::default_provider(),
        ))?),
        DataSourceKind::Csv => {
            let dir = section.csv_dir.as_ref().ok_or(LoadError::Missing("data.csv_dir"))?;
            Box::new(CsvProvider::new(dir.clone()))
        }
        DataSourceKind::Synthetic => Box::new(SyntheticProvider::new(section.seed)),
    })
}

/// News source for `section`. Alpaca credentials come from the environment.
pub fn news_source_for(section: &NewsSection) -> Result<Box<dyn NewsSource>, LoadError> {
    Ok(match section.source {
        NewsSourceKind::File => {
            let path = section.path.as_ref().ok_or(LoadError::Missing("news.path"))?;
            let source = FileNewsSource::open(path)?;
            tracing::info!(path = %path.display(), events = source.len(), "loaded news file");
            Box::new(source)
        }
        NewsSourceKind::Alpaca => {
            let credentials = AlpacaCredentials::from_env().map_err(NewsError::from)?;
            Box::new(AlpacaNewsClient::new(credentials)?)
        }
    })
}

/// Load validated bars for `symbols` from `provider`.
pub fn load_bars(
    symbols: &[String],
    provider: &dyn DataProvider,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<LoadedData, LoadError> {
    if !provider.is_available() {
        return Err(LoadError::Unavailable(provider.name().to_string()));
    }

    let mut bars = BTreeMap::new();
    let mut data_source = None;
    for symbol in symbols {
        let fetched = provider
            .fetch(symbol, start, end)
            .map_err(|source| LoadError::Data {
                symbol: symbol.clone(),
                source,
            })?;
        data_source.get_or_insert(fetched.source);
        let series: Vec<Bar> = fetched
            .into_bars()
            .into_iter()
            .filter(|b| b.date >= start && b.date <= end)
            .collect();
        if series.is_empty() {
            return Err(LoadError::NoBars {
                symbol: symbol.clone(),
                start,
                end,
            });
        }
        tracing::debug!(%symbol, bars = series.len(), provider = provider.name(), "bars loaded");
        bars.insert(symbol.clone(), series);
    }

    let dataset_hash = dataset_hash(&bars);
    Ok(LoadedData {
        bars,
        source: data_source.unwrap_or(DataSource::Synthetic),
        dataset_hash,
    })
}

fn dataset_hash(bars: &BTreeMap<String, Vec<Bar>>) -> String {
    let mut hasher = blake3::Hasher::new();
    for (symbol, series) in bars {
        hasher.update(symbol.as_bytes());
        for bar in series {
            hasher.update(bar.date.to_string().as_bytes());
            for v in [bar.open, bar.high, bar.low, bar.close] {
                hasher.update(&v.to_le_bytes());
            }
            hasher.update(&bar.volume.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn synthetic_load_is_deterministic() {
        let provider = SyntheticProvider::new(7);
        let symbols = vec!["SPY".to_string(), "QQQ".to_string()];
        let a = load_bars(&symbols, &provider, date(2024, 1, 1), date(2024, 3, 1)).unwrap();
        let b = load_bars(&symbols, &provider, date(2024, 1, 1), date(2024, 3, 1)).unwrap();
        assert_eq!(a.dataset_hash, b.dataset_hash);
        assert_eq!(a.source, DataSource::Synthetic);
        assert_eq!(a.symbols().collect::<Vec<_>>(), vec!["QQQ", "SPY"]);
        assert!(a.bars_for("SPY").unwrap().iter().all(|b| b.date <= date(2024, 3, 1)));
    }

    #[test]
    fn missing_csv_symbol_fails_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CsvProvider::new(dir.path());
        let err = load_bars(&["NOPE".to_string()], &provider, date(2024, 1, 1), date(2024, 2, 1))
            .unwrap_err();
        assert!(matches!(err, LoadError::Data { ref symbol, .. } if symbol == "NOPE"));
    }

    #[test]
    fn csv_section_without_dir_is_rejected() {
        let section = DataSection {
            source: DataSourceKind::Csv,
            ..DataSection::default()
        };
        assert!(matches!(provider_for(&section), Err(LoadError::Missing("data.csv_dir"))));
    }

    #[test]
    fn file_news_source_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.jsonl");
        std::fs::write(
            &path,
            r#"{"headline": "stocks rally", "created_at": "2024-01-02T14:00:00Z", "symbols": ["SPY"]}"#,
        )
        .unwrap();
        let section = NewsSection {
            source: NewsSourceKind::File,
            path: Some(path),
        };
        let source = news_source_for(&section).unwrap();
        let events = source.news("SPY", date(2024, 1, 1), date(2024, 1, 3)).unwrap();
        assert_eq!(events.len(), 1);
    }
}
