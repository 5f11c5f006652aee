//! Williams %R.
//!
//! %R(n)[i] = -100 * (HH(n) - C[i]) / (HH(n) - LL(n)), in [-100, 0].
//! Undefined when the n-bar range is zero.

use crate::domain::indicator::stochastic::high_low_window;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub fn calculate_williams_r(bars: &[Bar], period: usize) -> IndicatorSeries {
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let value = high_low_window(bars, i, period)
                .filter(|(highest, lowest)| highest - lowest > 0.0)
                .map(|(highest, lowest)| -100.0 * (highest - bar.close) / (highest - lowest));
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid: value.is_some(),
                value: IndicatorValue::Simple(value.unwrap_or(0.0)),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::WilliamsR(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::{make_bars, make_hlc_bars};

    #[test]
    fn williams_close_at_low() {
        let prices: Vec<f64> = (0..14).map(|i| 100.0 - i as f64).collect();
        let series = calculate_williams_r(&make_bars(&prices), 14);
        assert!((series.simple_at(13).unwrap() + 100.0).abs() < 1e-12);
        assert_eq!(series.simple_at(12), None);
    }

    #[test]
    fn williams_midrange() {
        let bars = make_hlc_bars(&[(110.0, 90.0, 100.0); 3]);
        let series = calculate_williams_r(&bars, 3);
        assert!((series.simple_at(2).unwrap() + 50.0).abs() < 1e-12);
    }

    #[test]
    fn williams_zero_range_is_undefined() {
        let series = calculate_williams_r(&make_bars(&[5.0; 20]), 14);
        assert!(series.values.iter().all(|p| !p.valid));
    }
}
