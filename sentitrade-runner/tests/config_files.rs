//! Shipped config files parse and validate.

use sentitrade_runner::{DataSourceKind, NewsSourceKind, RunConfig};

#[test]
fn spy_config_parses() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/spy.toml");
    let config = RunConfig::from_path(&path).unwrap();
    assert_eq!(config.strategy.symbol, "SPY");
    assert_eq!(config.data.source, DataSourceKind::Yahoo);
    assert_eq!(config.news.source, NewsSourceKind::Alpaca);
    assert_eq!(config, RunConfig::default());
}
