//! Configuration validation.
//!
//! Validates every config field before the engine starts. Each section has its
//! own `validate_*` entry point; [`validate_config`] runs all of them.

use chrono::Weekday;

use crate::domain::error::FusetraderError;
use crate::domain::ohlcv::Timeframe;
use crate::ports::config_port::ConfigPort;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), FusetraderError> {
    validate_engine_config(config)?;
    validate_risk_config(config)?;
    validate_level_config(config)?;
    validate_timeframe_config(config)?;
    validate_trailing_config(config)?;
    Ok(())
}

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), FusetraderError> {
    parse_symbols(config)?;
    let interval = read_int(config, "engine", "interval_seconds", 30)?;
    if interval < 1 {
        return Err(invalid("engine", "interval_seconds", "interval_seconds must be at least 1"));
    }
    for key in ["min_confidence", "early_exit_confidence"] {
        let value = read_double(config, "engine", key, 0.0)?;
        if !(0.0..=100.0).contains(&value) {
            return Err(invalid("engine", key, &format!("{key} must be between 0 and 100")));
        }
    }
    let max_trades = read_int(config, "engine", "max_daily_trades", 8)?;
    if max_trades < 1 {
        return Err(invalid("engine", "max_daily_trades", "max_daily_trades must be at least 1"));
    }
    parse_weekday(config)?;
    Ok(())
}

pub fn validate_risk_config(config: &dyn ConfigPort) -> Result<(), FusetraderError> {
    let risk = read_double(config, "risk", "risk_per_trade", 0.015)?;
    if risk <= 0.0 || risk > 0.1 {
        return Err(invalid("risk", "risk_per_trade", "risk_per_trade must be in (0, 0.1]"));
    }
    let floor = read_double(config, "risk", "min_free_margin", 100.0)?;
    if floor < 0.0 {
        return Err(invalid("risk", "min_free_margin", "min_free_margin must be non-negative"));
    }
    let low = read_double(config, "risk", "low_win_rate", 0.40)?;
    let high = read_double(config, "risk", "high_win_rate", 0.70)?;
    for (key, value) in [("low_win_rate", low), ("high_win_rate", high)] {
        if !(0.0..=1.0).contains(&value) {
            return Err(invalid("risk", key, &format!("{key} must be between 0 and 1")));
        }
    }
    if low >= high {
        return Err(invalid("risk", "low_win_rate", "low_win_rate must be below high_win_rate"));
    }
    let days = read_int(config, "risk", "performance_window_days", 7)?;
    if days < 1 {
        return Err(invalid(
            "risk",
            "performance_window_days",
            "performance_window_days must be at least 1",
        ));
    }
    Ok(())
}

pub fn validate_level_config(config: &dyn ConfigPort) -> Result<(), FusetraderError> {
    let default = read_double(config, "levels", "default_atr_multiplier", 2.0)?;
    if default <= 0.0 {
        return Err(invalid(
            "levels",
            "default_atr_multiplier",
            "default_atr_multiplier must be positive",
        ));
    }
    for key in config.section_keys("atr_multipliers") {
        let value = read_double(config, "atr_multipliers", &key, 0.0)?;
        if value <= 0.0 {
            return Err(invalid("atr_multipliers", &key, "multiplier must be positive"));
        }
    }
    Ok(())
}

pub fn validate_timeframe_config(config: &dyn ConfigPort) -> Result<(), FusetraderError> {
    let short = parse_timeframe(config, "short", Timeframe::M15)?;
    let medium = parse_timeframe(config, "medium", Timeframe::H1)?;
    let long = parse_timeframe(config, "long", Timeframe::H4)?;
    if !(short.duration() < medium.duration() && medium.duration() < long.duration()) {
        return Err(invalid(
            "timeframes",
            "medium",
            "timeframes must be strictly increasing: short < medium < long",
        ));
    }
    for (key, default) in [("short_bars", 500), ("medium_bars", 200), ("long_bars", 100)] {
        if read_int(config, "timeframes", key, default)? < 1 {
            return Err(invalid("timeframes", key, &format!("{key} must be at least 1")));
        }
    }
    Ok(())
}

pub fn validate_trailing_config(config: &dyn ConfigPort) -> Result<(), FusetraderError> {
    let multiplier = read_double(config, "trailing", "atr_multiplier", 1.5)?;
    if multiplier <= 0.0 {
        return Err(invalid("trailing", "atr_multiplier", "atr_multiplier must be positive"));
    }
    Ok(())
}

/// Upper-cased, de-duplicated-checked symbol list from `[engine] symbols`.
pub(crate) fn parse_symbols(config: &dyn ConfigPort) -> Result<Vec<String>, FusetraderError> {
    let raw = match config.get_string("engine", "symbols") {
        Some(s) if !s.trim().is_empty() => s,
        _ => {
            return Err(FusetraderError::ConfigMissing {
                section: "engine".to_string(),
                key: "symbols".to_string(),
            });
        }
    };

    let mut symbols: Vec<String> = Vec::new();
    for symbol in raw.split(',').map(|s| s.trim().to_uppercase()) {
        if symbol.is_empty() {
            return Err(invalid("engine", "symbols", "empty symbol in list"));
        }
        if symbols.contains(&symbol) {
            return Err(invalid("engine", "symbols", &format!("duplicate symbol {symbol}")));
        }
        symbols.push(symbol);
    }
    Ok(symbols)
}

pub(crate) fn parse_weekday(config: &dyn ConfigPort) -> Result<Weekday, FusetraderError> {
    match config.get_string("engine", "retrain_weekday") {
        None => Ok(Weekday::Mon),
        Some(s) => s
            .trim()
            .parse::<Weekday>()
            .map_err(|_| invalid("engine", "retrain_weekday", &format!("unknown weekday '{s}'"))),
    }
}

pub(crate) fn parse_timeframe(
    config: &dyn ConfigPort,
    key: &str,
    default: Timeframe,
) -> Result<Timeframe, FusetraderError> {
    match config.get_string("timeframes", key) {
        None => Ok(default),
        Some(s) => s
            .parse::<Timeframe>()
            .map_err(|reason| invalid("timeframes", key, &reason)),
    }
}

/// Reads an integer, failing on values that are present but not numeric.
pub(crate) fn read_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, FusetraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(section, key, &format!("'{s}' is not an integer"))),
    }
}

/// Reads a float, failing on values that are present but not numeric.
pub(crate) fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, FusetraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(s) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(invalid(section, key, &format!("'{s}' is not a number"))),
        },
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> FusetraderError {
    FusetraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn minimal_config_passes() {
        let config = make_config("[engine]\nsymbols = XAUUSD\n");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn full_config_passes() {
        let config = make_config(
            r#"
[engine]
symbols = XAUUSD, EURUSD, GBPUSD, BTCUSD
interval_seconds = 30
min_confidence = 75
max_daily_trades = 8
early_exit_confidence = 80
retrain_weekday = Mon

[risk]
risk_per_trade = 0.015
min_free_margin = 100
low_win_rate = 0.4
high_win_rate = 0.7
performance_window_days = 7

[levels]
default_atr_multiplier = 2.0

[atr_multipliers]
XAUUSD = 2.0
EURUSD = 1.5

[timeframes]
short = M15
medium = H1
long = H4

[trailing]
atr_multiplier = 1.5
"#,
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn missing_symbols_fails() {
        let config = make_config("[engine]\ninterval_seconds = 30\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, FusetraderError::ConfigMissing { key, .. } if key == "symbols"));
    }

    #[test]
    fn blank_symbols_fails() {
        let config = make_config("[engine]\nsymbols =   \n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, FusetraderError::ConfigMissing { key, .. } if key == "symbols"));
    }

    #[test]
    fn duplicate_symbols_fail() {
        let config = make_config("[engine]\nsymbols = XAUUSD, xauusd\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, FusetraderError::ConfigInvalid { key, .. } if key == "symbols"));
    }

    #[test]
    fn symbols_are_uppercased() {
        let config = make_config("[engine]\nsymbols = eurusd , btcusd\n");
        assert_eq!(parse_symbols(&config).unwrap(), vec!["EURUSD", "BTCUSD"]);
    }

    #[test]
    fn zero_interval_fails() {
        let config = make_config("[engine]\nsymbols = XAUUSD\ninterval_seconds = 0\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, FusetraderError::ConfigInvalid { key, .. } if key == "interval_seconds"));
    }

    #[test]
    fn non_numeric_value_fails() {
        let config = make_config("[engine]\nsymbols = XAUUSD\nmin_confidence = high\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, FusetraderError::ConfigInvalid { key, .. } if key == "min_confidence"));
    }

    #[test]
    fn confidence_out_of_range_fails() {
        let config = make_config("[engine]\nsymbols = XAUUSD\nearly_exit_confidence = 120\n");
        let err = validate_config(&config).unwrap_err();
        assert!(
            matches!(err, FusetraderError::ConfigInvalid { key, .. } if key == "early_exit_confidence")
        );
    }

    #[test]
    fn bad_weekday_fails() {
        let config = make_config("[engine]\nsymbols = XAUUSD\nretrain_weekday = Someday\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, FusetraderError::ConfigInvalid { key, .. } if key == "retrain_weekday"));
    }

    #[test]
    fn risk_per_trade_bounds() {
        for bad in ["0", "-0.01", "0.2"] {
            let config = make_config(&format!(
                "[engine]\nsymbols = XAUUSD\n[risk]\nrisk_per_trade = {bad}\n"
            ));
            let err = validate_config(&config).unwrap_err();
            assert!(matches!(err, FusetraderError::ConfigInvalid { key, .. } if key == "risk_per_trade"));
        }
    }

    #[test]
    fn win_rate_order_enforced() {
        let config = make_config(
            "[engine]\nsymbols = XAUUSD\n[risk]\nlow_win_rate = 0.8\nhigh_win_rate = 0.7\n",
        );
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, FusetraderError::ConfigInvalid { key, .. } if key == "low_win_rate"));
    }

    #[test]
    fn negative_symbol_multiplier_fails() {
        let config = make_config("[engine]\nsymbols = XAUUSD\n[atr_multipliers]\nXAUUSD = -1\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, FusetraderError::ConfigInvalid { section, .. } if section == "atr_multipliers"));
    }

    #[test]
    fn timeframes_must_increase() {
        let config = make_config(
            "[engine]\nsymbols = XAUUSD\n[timeframes]\nshort = H4\nmedium = H1\nlong = D1\n",
        );
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, FusetraderError::ConfigInvalid { section, .. } if section == "timeframes"));
    }

    #[test]
    fn unknown_timeframe_fails() {
        let config = make_config("[engine]\nsymbols = XAUUSD\n[timeframes]\nshort = W1\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, FusetraderError::ConfigInvalid { key, .. } if key == "short"));
    }

    #[test]
    fn trailing_multiplier_positive() {
        let config = make_config("[engine]\nsymbols = XAUUSD\n[trailing]\natr_multiplier = 0\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, FusetraderError::ConfigInvalid { section, .. } if section == "trailing"));
    }
}
