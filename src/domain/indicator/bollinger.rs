//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) bars are invalid.

use crate::domain::indicator::stddev::population_stddev;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULT_X100: u32 = 200;

pub fn calculate_bollinger(bars: &[Bar], period: usize, stddev_mult_x100: u32) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let warmup = period.saturating_sub(1);
    let mult = stddev_mult_x100 as f64 / 100.0;

    for i in 0..bars.len() {
        let valid = period > 0 && i >= warmup;

        let (upper, middle, lower) = if valid {
            let window: Vec<f64> = bars[i + 1 - period..=i].iter().map(|b| b.close).collect();
            let middle = window.iter().sum::<f64>() / period as f64;
            let stddev = population_stddev(&window);
            (middle + mult * stddev, middle, middle - mult * stddev)
        } else {
            (0.0, 0.0, 0.0)
        };

        values.push(IndicatorPoint {
            timestamp: bars[i].timestamp,
            valid,
            value: IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            },
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        },
        values,
    }
}

/// (close - lower) / (upper - lower); `None` when the band has zero width.
pub fn band_position(close: f64, upper: f64, lower: f64) -> Option<f64> {
    let width = upper - lower;
    if width <= 0.0 || !width.is_finite() {
        return None;
    }
    Some((close - lower) / width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    fn bands_at(series: &IndicatorSeries, i: usize) -> (f64, f64, f64) {
        match series.valid_at(i) {
            Some(IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            }) => (*upper, *middle, *lower),
            other => panic!("expected valid bands at {}, got {:?}", i, other),
        }
    }

    #[test]
    fn bollinger_warmup() {
        let series = calculate_bollinger(&make_bars(&[1.0, 2.0, 3.0]), 3, 200);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
    }

    #[test]
    fn bollinger_symmetric_around_middle() {
        let series =
            calculate_bollinger(&make_bars(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 8, 200);
        let (upper, middle, lower) = bands_at(&series, 7);
        assert!((middle - 5.0).abs() < 1e-12);
        assert!((upper - 9.0).abs() < 1e-12);
        assert!((lower - 1.0).abs() < 1e-12);
    }

    #[test]
    fn band_position_midpoint() {
        assert_eq!(band_position(5.0, 9.0, 1.0), Some(0.5));
    }

    #[test]
    fn band_position_undefined_for_zero_width() {
        let series = calculate_bollinger(&make_bars(&[3.0; 5]), 5, 200);
        let (upper, _, lower) = bands_at(&series, 4);
        assert_eq!(band_position(3.0, upper, lower), None);
    }
}
