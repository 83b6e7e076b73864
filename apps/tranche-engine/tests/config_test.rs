//! Loading configuration files from disk.

use std::io::Write;

use rust_decimal_macros::dec;
use tempfile::NamedTempFile;
use test_case::test_case;
use tranche_engine::config::{ConfigError, TradingMode, load_config};
use tranche_engine::domain::shared::{InstrumentId, SizingStrategy};
use tranche_engine::domain::trade_execution::Temperature;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn loads_file_with_env_defaults() {
    let file = write_config(
        r#"
environment:
  mode: ${TRANCHE_TEST_UNSET_MODE:-SIMULATED}
broker:
  api_key: "${TRANCHE_TEST_UNSET_KEY}"
  simulated:
    prices:
      BTC-USD: 60000
safety:
  max_trades_per_day: ${TRANCHE_TEST_UNSET_MAX_TRADES:-12}
  min_temperature: WARM
instruments:
  - id: BTC-USD
    base_order_notional: 250
    sizing_strategy: PYRAMID
    max_tranches: 3
"#,
    );

    let config = load_config(file.path().to_str()).unwrap();
    assert_eq!(config.environment.mode, TradingMode::Simulated);
    assert!(config.broker.api_key.is_empty());
    assert_eq!(config.safety.max_trades_per_day, 12);
    assert_eq!(config.safety.min_temperature, Temperature::Warm);

    let registry = config.registry();
    let btc = registry.get(&InstrumentId::new("BTC-USD")).unwrap();
    assert_eq!(btc.base_order_notional.amount(), dec!(250));
    assert_eq!(btc.sizing_strategy, SizingStrategy::Pyramid);
    assert_eq!(btc.max_tranches, 3);
}

#[test]
fn missing_file_is_read_error() {
    let err = load_config(Some("/nonexistent/tranche/config.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::ReadError { .. }));
}

#[test]
fn malformed_yaml_is_parse_error() {
    let file = write_config("gateway: [unclosed\n");
    let err = load_config(file.path().to_str()).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}

#[test_case("safety:\n  min_notional: 0\n" ; "zero minimum notional")]
#[test_case("safety:\n  min_notional: 500\n  max_notional: 100\n" ; "inverted notional range")]
#[test_case("execution:\n  workers: 0\n" ; "no workers")]
#[test_case("gateway:\n  jitter_factor: 1.5\n" ; "jitter above one")]
#[test_case("reconciliation:\n  interval_secs: 0\n" ; "zero reconciliation interval")]
#[test_case("instruments:\n  - id: BTC-USD\n    base_order_notional: -5\n" ; "negative base notional")]
fn rejects_invalid_values(yaml: &str) {
    let file = write_config(yaml);
    let err = load_config(file.path().to_str()).unwrap_err();
    assert!(
        matches!(err, ConfigError::ValidationError(_)),
        "unexpected error: {err}"
    );
}
