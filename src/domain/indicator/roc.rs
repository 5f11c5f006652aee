//! ROC (Rate of Change) and momentum ratio.
//!
//! ROC(n)[i] = ((C[i] - C[i-n]) / C[i-n]) * 100
//! MOMENTUM(n)[i] = C[i] / C[i-n]
//! Undefined (invalid) when C[i-n] == 0. Warmup: first n bars invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub fn calculate_roc(bars: &[Bar], period: usize) -> IndicatorSeries {
    lagged(bars, period, IndicatorType::Roc(period), |prev, curr| {
        (curr - prev) / prev * 100.0
    })
}

pub fn calculate_momentum(bars: &[Bar], period: usize) -> IndicatorSeries {
    lagged(bars, period, IndicatorType::Momentum(period), |prev, curr| {
        curr / prev
    })
}

fn lagged(
    bars: &[Bar],
    period: usize,
    indicator_type: IndicatorType,
    f: impl Fn(f64, f64) -> f64,
) -> IndicatorSeries {
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let value = (period > 0 && i >= period)
                .then(|| bars[i - period].close)
                .filter(|&prev| prev != 0.0)
                .map(|prev| f(prev, bar.close));
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid: value.is_some(),
                value: IndicatorValue::Simple(value.unwrap_or(0.0)),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;

    #[test]
    fn roc_warmup() {
        let series = calculate_roc(&make_bars(&[100.0, 110.0, 121.0]), 2);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!((series.simple_at(2).unwrap() - 21.0).abs() < 1e-9);
    }

    #[test]
    fn roc_negative_change() {
        let series = calculate_roc(&make_bars(&[100.0, 90.0]), 1);
        assert!((series.simple_at(1).unwrap() + 10.0).abs() < 1e-9);
    }

    #[test]
    fn roc_zero_base_is_invalid() {
        let series = calculate_roc(&make_bars(&[0.0, 10.0]), 1);
        assert!(!series.values[1].valid);
    }

    #[test]
    fn momentum_ratio() {
        let series = calculate_momentum(&make_bars(&[50.0, 60.0, 75.0]), 2);
        assert!((series.simple_at(2).unwrap() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn zero_period_is_invalid() {
        let series = calculate_roc(&make_bars(&[1.0, 2.0]), 0);
        assert!(series.values.iter().all(|p| !p.valid));
    }
}
