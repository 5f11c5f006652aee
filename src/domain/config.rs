//! Typed engine configuration built from a [`ConfigPort`].
//!
//! Every `build_*` function validates its section first, so a returned struct
//! always holds usable values.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Weekday;

use crate::domain::config_validation::{
    parse_symbols, parse_timeframe, parse_weekday, read_double, read_int, validate_engine_config,
    validate_level_config, validate_risk_config, validate_timeframe_config,
    validate_trailing_config,
};
use crate::domain::error::FusetraderError;
use crate::domain::levels::LevelCalculator;
use crate::domain::ohlcv::Timeframe;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub symbols: Vec<String>,
    pub interval: Duration,
    pub min_confidence: f64,
    pub max_daily_trades: u32,
    pub early_exit_confidence: f64,
    pub retrain_weekday: Weekday,
}

impl EngineConfig {
    pub fn for_symbols(symbols: &[&str]) -> Self {
        Self {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            interval: Duration::from_secs(30),
            min_confidence: 75.0,
            max_daily_trades: 8,
            early_exit_confidence: 80.0,
            retrain_weekday: Weekday::Mon,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub risk_per_trade: f64,
    pub min_free_margin: f64,
    pub low_win_rate: f64,
    pub high_win_rate: f64,
    pub performance_window_days: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade: 0.015,
            min_free_margin: 100.0,
            low_win_rate: 0.40,
            high_win_rate: 0.70,
            performance_window_days: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelConfig {
    pub default_multiplier: f64,
    pub multipliers: HashMap<String, f64>,
}

impl From<LevelConfig> for LevelCalculator {
    fn from(config: LevelConfig) -> Self {
        LevelCalculator::new(config.multipliers, config.default_multiplier)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeframeConfig {
    pub short: Timeframe,
    pub medium: Timeframe,
    pub long: Timeframe,
    pub short_bars: usize,
    pub medium_bars: usize,
    pub long_bars: usize,
}

impl Default for TimeframeConfig {
    fn default() -> Self {
        Self {
            short: Timeframe::M15,
            medium: Timeframe::H1,
            long: Timeframe::H4,
            short_bars: 500,
            medium_bars: 200,
            long_bars: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailingConfig {
    pub atr_multiplier: f64,
}

impl Default for TrailingConfig {
    fn default() -> Self {
        Self { atr_multiplier: 1.5 }
    }
}

/// Everything the core needs, validated.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub risk: RiskConfig,
    pub levels: LevelConfig,
    pub timeframes: TimeframeConfig,
    pub trailing: TrailingConfig,
    pub model_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_port(config: &dyn ConfigPort) -> Result<Self, FusetraderError> {
        Ok(Self {
            engine: build_engine_config(config)?,
            risk: build_risk_config(config)?,
            levels: build_level_config(config)?,
            timeframes: build_timeframe_config(config)?,
            trailing: build_trailing_config(config)?,
            model_path: config
                .get_string("model", "path")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}

pub fn build_engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, FusetraderError> {
    validate_engine_config(config)?;
    Ok(EngineConfig {
        symbols: parse_symbols(config)?,
        interval: Duration::from_secs(read_int(config, "engine", "interval_seconds", 30)? as u64),
        min_confidence: read_double(config, "engine", "min_confidence", 75.0)?,
        max_daily_trades: read_int(config, "engine", "max_daily_trades", 8)? as u32,
        early_exit_confidence: read_double(config, "engine", "early_exit_confidence", 80.0)?,
        retrain_weekday: parse_weekday(config)?,
    })
}

pub fn build_risk_config(config: &dyn ConfigPort) -> Result<RiskConfig, FusetraderError> {
    validate_risk_config(config)?;
    let defaults = RiskConfig::default();
    Ok(RiskConfig {
        risk_per_trade: read_double(config, "risk", "risk_per_trade", defaults.risk_per_trade)?,
        min_free_margin: read_double(config, "risk", "min_free_margin", defaults.min_free_margin)?,
        low_win_rate: read_double(config, "risk", "low_win_rate", defaults.low_win_rate)?,
        high_win_rate: read_double(config, "risk", "high_win_rate", defaults.high_win_rate)?,
        performance_window_days: read_int(
            config,
            "risk",
            "performance_window_days",
            defaults.performance_window_days as i64,
        )? as u32,
    })
}

/// Symbol keys are upper-cased since the INI layer folds keys to lower case.
pub fn build_level_config(config: &dyn ConfigPort) -> Result<LevelConfig, FusetraderError> {
    validate_level_config(config)?;
    let mut multipliers = HashMap::new();
    for key in config.section_keys("atr_multipliers") {
        let value = read_double(config, "atr_multipliers", &key, 0.0)?;
        multipliers.insert(key.to_uppercase(), value);
    }
    Ok(LevelConfig {
        default_multiplier: read_double(config, "levels", "default_atr_multiplier", 2.0)?,
        multipliers,
    })
}

pub fn build_timeframe_config(config: &dyn ConfigPort) -> Result<TimeframeConfig, FusetraderError> {
    validate_timeframe_config(config)?;
    let defaults = TimeframeConfig::default();
    let bars = |key: &str, default: usize| -> Result<usize, FusetraderError> {
        Ok(read_int(config, "timeframes", key, default as i64)? as usize)
    };
    Ok(TimeframeConfig {
        short: parse_timeframe(config, "short", defaults.short)?,
        medium: parse_timeframe(config, "medium", defaults.medium)?,
        long: parse_timeframe(config, "long", defaults.long)?,
        short_bars: bars("short_bars", defaults.short_bars)?,
        medium_bars: bars("medium_bars", defaults.medium_bars)?,
        long_bars: bars("long_bars", defaults.long_bars)?,
    })
}

pub fn build_trailing_config(config: &dyn ConfigPort) -> Result<TrailingConfig, FusetraderError> {
    validate_trailing_config(config)?;
    Ok(TrailingConfig {
        atr_multiplier: read_double(config, "trailing", "atr_multiplier", 1.5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn defaults_apply() {
        let config = AppConfig::from_port(&make_config("[engine]\nsymbols = XAUUSD\n")).unwrap();
        assert_eq!(config.engine, EngineConfig::for_symbols(&["XAUUSD"]));
        assert_eq!(config.risk, RiskConfig::default());
        assert_eq!(config.timeframes, TimeframeConfig::default());
        assert_eq!(config.trailing, TrailingConfig::default());
        assert!(config.levels.multipliers.is_empty());
        assert_eq!(config.levels.default_multiplier, 2.0);
        assert_eq!(config.model_path, None);
    }

    #[test]
    fn explicit_values() {
        let config = AppConfig::from_port(&make_config(
            r#"
[engine]
symbols = XAUUSD, BTCUSD
interval_seconds = 60
min_confidence = 70
max_daily_trades = 3
retrain_weekday = Fri

[risk]
risk_per_trade = 0.02
performance_window_days = 14

[atr_multipliers]
XAUUSD = 2.0
BTCUSD = 3.0

[timeframes]
short = M5
medium = M30
long = H4
short_bars = 300

[trailing]
atr_multiplier = 2.0

[model]
path = /tmp/model.json
"#,
        ))
        .unwrap();

        assert_eq!(config.engine.symbols, vec!["XAUUSD", "BTCUSD"]);
        assert_eq!(config.engine.interval, Duration::from_secs(60));
        assert_eq!(config.engine.max_daily_trades, 3);
        assert_eq!(config.engine.retrain_weekday, Weekday::Fri);
        assert_eq!(config.risk.risk_per_trade, 0.02);
        assert_eq!(config.risk.performance_window_days, 14);
        assert_eq!(config.levels.multipliers.get("BTCUSD"), Some(&3.0));
        assert_eq!(config.timeframes.short, Timeframe::M5);
        assert_eq!(config.timeframes.short_bars, 300);
        assert_eq!(config.timeframes.medium_bars, 200);
        assert_eq!(config.trailing.atr_multiplier, 2.0);
        assert_eq!(config.model_path, Some(PathBuf::from("/tmp/model.json")));

        let calc = LevelCalculator::from(config.levels);
        assert_eq!(calc.multiplier_for("XAUUSD"), 2.0);
        assert_eq!(calc.multiplier_for("EURUSD"), 2.0);
    }

    #[test]
    fn invalid_config_does_not_build() {
        let err =
            AppConfig::from_port(&make_config("[risk]\nrisk_per_trade = 0.01\n")).unwrap_err();
        assert!(matches!(err, FusetraderError::ConfigMissing { .. }));
    }
}
