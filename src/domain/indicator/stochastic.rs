//! Stochastic oscillator.
//!
//! %K(n)[i] = 100 * (C[i] - LL(n)) / (HH(n) - LL(n))
//! %D(m)[i] = SMA(m) of %K
//!
//! %K is undefined when the n-bar range is zero; %D needs m consecutive
//! defined %K values.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub const DEFAULT_K_PERIOD: usize = 14;
pub const DEFAULT_D_PERIOD: usize = 3;

pub fn calculate_stochastic(bars: &[Bar], k_period: usize, d_period: usize) -> IndicatorSeries {
    let k_values: Vec<Option<f64>> = (0..bars.len())
        .map(|i| percent_k(bars, i, k_period))
        .collect();

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let d = (d_period > 0 && i + 1 >= d_period)
                .then(|| &k_values[i + 1 - d_period..=i])
                .and_then(|window| window.iter().copied().sum::<Option<f64>>())
                .map(|sum| sum / d_period as f64);

            match (k_values[i], d) {
                (Some(k), Some(d)) => IndicatorPoint {
                    timestamp: bar.timestamp,
                    valid: true,
                    value: IndicatorValue::Stochastic { k, d },
                },
                (k, _) => IndicatorPoint {
                    timestamp: bar.timestamp,
                    valid: false,
                    value: IndicatorValue::Stochastic {
                        k: k.unwrap_or(0.0),
                        d: 0.0,
                    },
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Stochastic { k_period, d_period },
        values,
    }
}

/// Highest high and lowest low over the `period` bars ending at `index`.
pub(crate) fn high_low_window(bars: &[Bar], index: usize, period: usize) -> Option<(f64, f64)> {
    if period == 0 || index + 1 < period || index >= bars.len() {
        return None;
    }
    let window = &bars[index + 1 - period..=index];
    let highest = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let lowest = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    Some((highest, lowest))
}

fn percent_k(bars: &[Bar], index: usize, period: usize) -> Option<f64> {
    let (highest, lowest) = high_low_window(bars, index, period)?;
    let range = highest - lowest;
    if range <= 0.0 {
        return None;
    }
    Some(100.0 * (bars[index].close - lowest) / range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::{make_bars, make_hlc_bars};

    fn kd_at(series: &IndicatorSeries, i: usize) -> Option<(f64, f64)> {
        match series.valid_at(i) {
            Some(IndicatorValue::Stochastic { k, d }) => Some((*k, *d)),
            _ => None,
        }
    }

    #[test]
    fn stochastic_warmup() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let series = calculate_stochastic(&make_bars(&prices), 14, 3);
        // %K from index 13, %D needs 3 of them
        assert!(kd_at(&series, 14).is_none());
        assert!(kd_at(&series, 15).is_some());
    }

    #[test]
    fn stochastic_close_at_high_is_100() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let series = calculate_stochastic(&make_bars(&prices), 14, 3);
        let (k, d) = kd_at(&series, 19).unwrap();
        assert!((k - 100.0).abs() < 1e-12);
        assert!((d - 100.0).abs() < 1e-12);
    }

    #[test]
    fn stochastic_midrange() {
        let bars = make_hlc_bars(&[(110.0, 90.0, 100.0); 5]);
        let series = calculate_stochastic(&bars, 3, 3);
        let (k, d) = kd_at(&series, 4).unwrap();
        assert!((k - 50.0).abs() < 1e-12);
        assert!((d - 50.0).abs() < 1e-12);
    }

    #[test]
    fn stochastic_zero_range_is_undefined() {
        let series = calculate_stochastic(&make_bars(&[100.0; 30]), 14, 3);
        assert!(series.values.iter().all(|p| !p.valid));
    }
}
