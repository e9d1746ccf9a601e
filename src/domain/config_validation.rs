//! Configuration validation.
//!
//! Reads and checks every `[backtest]`, `[strategy]` and `[data]` key before
//! a run starts. The first problem found is returned.

use crate::domain::alignment::DEFAULT_LAG_DAYS;
use crate::domain::backtest::BacktestConfig;
use crate::domain::error::FundtraderError;
use crate::domain::schedule::RebalanceCadence;
use crate::domain::simulation::StalePricePolicy;
use crate::domain::strategy::{StrategyParams, StrategyRegistry};
use crate::domain::universe::parse_codes;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 100_000.0;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), FundtraderError> {
    build_backtest_config(config)?;
    configured_codes(config)?;
    Ok(())
}

pub fn validate_strategy_config(
    config: &dyn ConfigPort,
    registry: &StrategyRegistry,
) -> Result<(), FundtraderError> {
    let name = strategy_name(config)?;
    build_strategy_params(config, registry, &name)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), FundtraderError> {
    let source = data_source(config)?;
    if source == DataSource::Sqlite && !cfg!(feature = "sqlite") {
        return Err(FundtraderError::invalid(
            "data",
            "source",
            "sqlite support was not compiled in",
        ));
    }
    Ok(())
}

/// Parse `[backtest]` into a checked [`BacktestConfig`].
pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, FundtraderError> {
    let start_date = parse_date(config, "start_date")?;
    let end_date = parse_date(config, "end_date")?;
    if start_date > end_date {
        return Err(FundtraderError::invalid(
            "backtest",
            "start_date",
            "start_date must not be after end_date",
        ));
    }

    let initial_capital =
        parse_number(config, "backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL)?;
    if initial_capital <= 0.0 {
        return Err(FundtraderError::invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }

    let commission = parse_number(config, "backtest", "commission", 0.0)?;
    if commission < 0.0 {
        return Err(FundtraderError::invalid(
            "backtest",
            "commission",
            "commission must be non-negative",
        ));
    }

    let cadence = match config.get_string("backtest", "rebalance") {
        Some(value) => value.parse::<RebalanceCadence>()?,
        None => RebalanceCadence::Daily,
    };

    let lag_days = parse_number(config, "backtest", "lag_days", DEFAULT_LAG_DAYS as f64)?;
    if lag_days < 0.0 || lag_days.fract() != 0.0 {
        return Err(FundtraderError::invalid(
            "backtest",
            "lag_days",
            "lag_days must be a non-negative whole number of days",
        ));
    }

    let stale_prices = match config.get_string("backtest", "stale_prices") {
        Some(value) => value.parse::<StalePricePolicy>()?,
        None => StalePricePolicy::default(),
    };

    let fundamental_fallback = match config.get_string("backtest", "fundamental_fallback") {
        Some(value) => parse_bool(&value).ok_or_else(|| {
            FundtraderError::invalid(
                "backtest",
                "fundamental_fallback",
                format!("expected true or false, got '{}'", value),
            )
        })?,
        None => true,
    };

    let bt_config = BacktestConfig {
        start_date,
        end_date,
        initial_capital,
        commission,
        cadence,
        lag_days: lag_days as i64,
        stale_prices,
        fundamental_fallback,
    };
    bt_config.validate()?;
    Ok(bt_config)
}

/// Codes from `codes` (or the single-instrument `code` key).
pub fn configured_codes(config: &dyn ConfigPort) -> Result<Vec<String>, FundtraderError> {
    let codes = config.get_string("backtest", "codes");
    let code = config.get_string("backtest", "code");
    let (key, raw) = match (codes, code) {
        (Some(c), _) if !c.trim().is_empty() => ("codes", c),
        (_, Some(c)) if !c.trim().is_empty() => ("code", c),
        _ => return Err(FundtraderError::missing("backtest", "codes")),
    };
    parse_codes(&raw).map_err(|e| FundtraderError::invalid("backtest", key, e.to_string()))
}

pub fn strategy_name(config: &dyn ConfigPort) -> Result<String, FundtraderError> {
    match config.get_string("strategy", "name") {
        Some(name) if !name.trim().is_empty() => Ok(name.trim().to_string()),
        _ => Err(FundtraderError::missing("strategy", "name")),
    }
}

/// Collect the numeric parameters `name` declares from `[strategy]`.
pub fn build_strategy_params(
    config: &dyn ConfigPort,
    registry: &StrategyRegistry,
    name: &str,
) -> Result<StrategyParams, FundtraderError> {
    let declared = registry
        .parameters(name)
        .ok_or_else(|| FundtraderError::UnknownStrategy {
            name: name.to_string(),
            available: registry.names().collect::<Vec<_>>().join(", "),
        })?;

    let mut params = StrategyParams::new();
    for key in declared {
        if config.get_string("strategy", key).is_some() {
            params.set(key, parse_number(config, "strategy", key, 0.0)?);
        }
    }
    Ok(params)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Csv,
    Sqlite,
}

pub fn data_source(config: &dyn ConfigPort) -> Result<DataSource, FundtraderError> {
    match config.get_string("data", "source") {
        None => Ok(DataSource::Csv),
        Some(s) => match s.trim().to_lowercase().as_str() {
            "csv" => Ok(DataSource::Csv),
            "sqlite" => Ok(DataSource::Sqlite),
            other => Err(FundtraderError::invalid(
                "data",
                "source",
                format!("unknown data source '{}' (expected csv or sqlite)", other),
            )),
        },
    }
}

fn parse_date(config: &dyn ConfigPort, field: &str) -> Result<NaiveDate, FundtraderError> {
    match config.get_string("backtest", field) {
        None => Err(FundtraderError::missing("backtest", field)),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            FundtraderError::invalid(
                "backtest",
                field,
                format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

/// A finite number, or `default` when the key is absent. Present but
/// unparsable values are an error rather than silently defaulted.
fn parse_number(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, FundtraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(FundtraderError::invalid(
                section,
                key,
                format!("expected a number, got '{}'", raw),
            )),
        },
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    const BASE: &str = "[backtest]\nstart_date = 2020-01-01\nend_date = 2024-12-31\ncodes = CBA\n";

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn with(extra: &str) -> FileConfigAdapter {
        make_config(&format!("{}{}", BASE, extra))
    }

    fn invalid_key(err: FundtraderError) -> String {
        match err {
            FundtraderError::ConfigInvalid { key, .. } => key,
            other => panic!("expected ConfigInvalid, got {other}"),
        }
    }

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            r#"
[backtest]
initial_capital = 100000.0
commission = 10.0
rebalance = Monthly
lag_days = 45
stale_prices = last_known
fundamental_fallback = false
start_date = 2020-01-01
end_date = 2024-12-31
codes = CBA, BHP
"#,
        );
        assert!(validate_backtest_config(&config).is_ok());
        let bt = build_backtest_config(&config).unwrap();
        assert_eq!(bt.cadence, RebalanceCadence::Monthly);
        assert_eq!(bt.lag_days, 45);
        assert_eq!(bt.stale_prices, StalePricePolicy::LastKnown);
        assert!(!bt.fundamental_fallback);
        assert_eq!(bt.commission, 10.0);
    }

    #[test]
    fn defaults_applied() {
        let bt = build_backtest_config(&with("")).unwrap();
        assert_eq!(bt.initial_capital, DEFAULT_INITIAL_CAPITAL);
        assert_eq!(bt.commission, 0.0);
        assert_eq!(bt.cadence, RebalanceCadence::Daily);
        assert_eq!(bt.lag_days, 60);
        assert_eq!(bt.stale_prices, StalePricePolicy::Skip);
        assert!(bt.fundamental_fallback);
    }

    #[test]
    fn initial_capital_must_be_positive() {
        let err = validate_backtest_config(&with("initial_capital = -100\n")).unwrap_err();
        assert_eq!(invalid_key(err), "initial_capital");
        let err = validate_backtest_config(&with("initial_capital = 0\n")).unwrap_err();
        assert_eq!(invalid_key(err), "initial_capital");
    }

    #[test]
    fn non_numeric_capital_is_rejected_not_defaulted() {
        let err = validate_backtest_config(&with("initial_capital = lots\n")).unwrap_err();
        assert_eq!(invalid_key(err), "initial_capital");
    }

    #[test]
    fn commission_negative_fails() {
        let err = validate_backtest_config(&with("commission = -5\n")).unwrap_err();
        assert_eq!(invalid_key(err), "commission");
    }

    #[test]
    fn unknown_cadence_fails() {
        let err = validate_backtest_config(&with("rebalance = Hourly\n")).unwrap_err();
        assert_eq!(invalid_key(err), "rebalance");
    }

    #[test]
    fn zero_interval_fails() {
        let err = validate_backtest_config(&with("rebalance = 0\n")).unwrap_err();
        assert_eq!(invalid_key(err), "rebalance");
    }

    #[test]
    fn fixed_interval_accepted() {
        let bt = build_backtest_config(&with("rebalance = 21\n")).unwrap();
        assert_eq!(bt.cadence, RebalanceCadence::EveryN(21));
    }

    #[test]
    fn negative_or_fractional_lag_fails() {
        let err = validate_backtest_config(&with("lag_days = -1\n")).unwrap_err();
        assert_eq!(invalid_key(err), "lag_days");
        let err = validate_backtest_config(&with("lag_days = 1.5\n")).unwrap_err();
        assert_eq!(invalid_key(err), "lag_days");
    }

    #[test]
    fn unknown_stale_policy_fails() {
        let err = validate_backtest_config(&with("stale_prices = guess\n")).unwrap_err();
        assert_eq!(invalid_key(err), "stale_prices");
    }

    #[test]
    fn bad_fallback_flag_fails() {
        let err = validate_backtest_config(&with("fundamental_fallback = maybe\n")).unwrap_err();
        assert_eq!(invalid_key(err), "fundamental_fallback");
    }

    #[test]
    fn invalid_start_date_format_fails() {
        let config =
            make_config("[backtest]\nstart_date = 2020/01/01\nend_date = 2024-12-31\ncodes = CBA\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), "start_date");
    }

    #[test]
    fn missing_end_date_fails() {
        let config = make_config("[backtest]\nstart_date = 2020-01-01\ncodes = CBA\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, FundtraderError::ConfigMissing { key, .. } if key == "end_date"));
    }

    #[test]
    fn single_date_window_is_valid() {
        let config = make_config("[backtest]\nstart_date = 2024-06-03\nend_date = 2024-06-03\n");
        let bt = build_backtest_config(&config).unwrap();
        assert_eq!(bt.start_date, bt.end_date);
    }

    #[test]
    fn start_date_after_end_date_fails() {
        let config = make_config("[backtest]\nstart_date = 2024-12-31\nend_date = 2020-01-01\ncodes = CBA\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), "start_date");
    }

    #[test]
    fn missing_codes_fails() {
        let config = make_config("[backtest]\nstart_date = 2020-01-01\nend_date = 2024-12-31\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, FundtraderError::ConfigMissing { key, .. } if key == "codes"));
    }

    #[test]
    fn single_code_key_accepted() {
        let config = make_config("[backtest]\nstart_date = 2020-01-01\nend_date = 2024-12-31\ncode = cba\n");
        assert_eq!(configured_codes(&config).unwrap(), vec!["CBA"]);
    }

    #[test]
    fn duplicate_codes_fail() {
        let config = make_config("[backtest]\nstart_date = 2020-01-01\nend_date = 2024-12-31\ncodes = CBA,cba\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), "codes");
    }

    #[test]
    fn valid_strategy_config_passes() {
        let registry = StrategyRegistry::builtin();
        let config = make_config("[strategy]\nname = value_roe\npb_max = 2.0\n");
        assert!(validate_strategy_config(&config, &registry).is_ok());
        let params = build_strategy_params(&config, &registry, "value_roe").unwrap();
        assert_eq!(params.get_or("pb_max", 1.5), 2.0);
        assert_eq!(params.get_or("roe_min", 0.1), 0.1);
    }

    #[test]
    fn missing_strategy_name_fails() {
        let registry = StrategyRegistry::builtin();
        let config = make_config("[strategy]\npb_max = 2.0\n");
        let err = validate_strategy_config(&config, &registry).unwrap_err();
        assert!(matches!(err, FundtraderError::ConfigMissing { key, .. } if key == "name"));
    }

    #[test]
    fn unknown_strategy_fails() {
        let registry = StrategyRegistry::builtin();
        let config = make_config("[strategy]\nname = momentum\n");
        let err = validate_strategy_config(&config, &registry).unwrap_err();
        assert!(matches!(err, FundtraderError::UnknownStrategy { .. }));
    }

    #[test]
    fn non_numeric_strategy_parameter_fails() {
        let registry = StrategyRegistry::builtin();
        let config = make_config("[strategy]\nname = multi_factor\nmin_roe = high\n");
        let err = validate_strategy_config(&config, &registry).unwrap_err();
        assert_eq!(invalid_key(err), "min_roe");
    }

    #[test]
    fn data_source_defaults_to_csv() {
        assert_eq!(data_source(&make_config("[data]\n")).unwrap(), DataSource::Csv);
        assert_eq!(
            data_source(&make_config("[data]\nsource = SQLite\n")).unwrap(),
            DataSource::Sqlite
        );
        let err = data_source(&make_config("[data]\nsource = postgres\n")).unwrap_err();
        assert_eq!(invalid_key(err), "source");
    }
}
