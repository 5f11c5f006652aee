//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Which indicator and parameters produced a series
//! - `IndicatorSeries`: A time series of indicator values
//!
//! Every calculator returns one point per input bar. Points inside the warmup
//! window, or where the value is undefined (e.g. a zero-width range), carry
//! `valid: false` and must not be read as zero.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod roc;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod stochastic;
pub mod williams;

pub use atr::calculate_atr;
pub use bollinger::calculate_bollinger;
pub use ema::calculate_ema;
pub use macd::calculate_macd;
pub use roc::{calculate_momentum, calculate_roc};
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;
pub use stddev::calculate_stddev;
pub use stochastic::calculate_stochastic;
pub use williams::calculate_williams_r;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Stochastic {
        k: f64,
        d: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Roc(usize),
    Momentum(usize),
    Atr(usize),
    Stddev(usize),
    WilliamsR(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Scalar value at `index`, `None` if out of range, invalid or not scalar.
    pub fn simple_at(&self, index: usize) -> Option<f64> {
        match self.values.get(index) {
            Some(IndicatorPoint {
                valid: true,
                value: IndicatorValue::Simple(v),
                ..
            }) => Some(*v),
            _ => None,
        }
    }

    /// Scalar value of the most recent point, if valid.
    pub fn last_simple(&self) -> Option<f64> {
        self.values.len().checked_sub(1).and_then(|i| self.simple_at(i))
    }

    /// The value at `index` when the point is valid.
    pub fn valid_at(&self, index: usize) -> Option<&IndicatorValue> {
        self.values
            .get(index)
            .filter(|p| p.valid)
            .map(|p| &p.value)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_at_skips_invalid_points() {
        let bars = test_support::make_bars(&[1.0, 2.0, 3.0]);
        let series = calculate_sma(&bars, 2);
        assert_eq!(series.simple_at(0), None);
        assert_eq!(series.simple_at(1), Some(1.5));
        assert_eq!(series.last_simple(), Some(2.5));
        assert_eq!(series.simple_at(10), None);
    }

    #[test]
    fn valid_at_exposes_compound_values() {
        let bars = test_support::make_bars(&[1.0, 2.0, 3.0, 4.0]);
        let series = calculate_bollinger(&bars, 3, 200);
        assert!(series.valid_at(1).is_none());
        match series.valid_at(3) {
            Some(IndicatorValue::Bollinger { middle, .. }) => assert!((middle - 3.0).abs() < 1e-12),
            other => panic!("expected bollinger point, got {other:?}"),
        }
        assert_eq!(series.simple_at(3), None);
    }
}
