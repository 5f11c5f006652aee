//! Average True Range.
//!
//! TR[i] = max(H[i] - L[i], |H[i] - C[i-1]|, |L[i] - C[i-1]|) for i >= 1.
//! ATR(n)[i] = mean(TR[i-n+1..=i]), a plain rolling mean rather than Wilder smoothing.
//! Warmup: the first bar has no true range, so ATR is valid from index n.

use crate::domain::indicator::sma::rolling_mean;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    if let Some(first) = bars.first() {
        values.push(IndicatorPoint {
            timestamp: first.timestamp,
            valid: false,
            value: IndicatorValue::Simple(0.0),
        });
    }

    let ranges: Vec<f64> = bars
        .windows(2)
        .map(|w| w[1].true_range(w[0].close))
        .collect();

    for (bar, atr) in bars.iter().skip(1).zip(rolling_mean(&ranges, period)) {
        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid: atr.is_some(),
            value: IndicatorValue::Simple(atr.unwrap_or(0.0)),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}
