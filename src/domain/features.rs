//! Indicator Engine: turns a [`Series`] into named feature values.
//!
//! All indicators are computed once over the whole series by [`FeatureFrame`];
//! a [`FeatureVector`] is then read out for any bar. Features whose lookback
//! is not yet satisfied, or whose value is undefined at that bar, are left out
//! of the vector instead of being zero-filled.

use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::domain::indicator::bollinger::band_position;
use crate::domain::indicator::sma::rolling_mean;
use crate::domain::indicator::{
    IndicatorSeries, IndicatorValue, calculate_atr, calculate_bollinger, calculate_ema,
    calculate_macd, calculate_momentum, calculate_roc, calculate_rsi, calculate_sma,
    calculate_stddev, calculate_stochastic, calculate_williams_r,
};
use crate::domain::ohlcv::Series;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    Sma20,
    Sma50,
    Ema12,
    Ema20,
    Ema26,
    Ema50,
    Ema200,
    EmaRatio,
    SmaRatio,
    Rsi14,
    MacdLine,
    MacdSignal,
    MacdHistogram,
    Roc10,
    Momentum10,
    StochK,
    StochD,
    WilliamsR,
    Volatility20,
    Atr14,
    BbUpper,
    BbLower,
    BbPosition,
    PriceChange1,
    PriceChange2,
    PriceChange5,
    VolumeRatio,
    HourSin,
    HourCos,
    DowSin,
    DowCos,
}

impl Feature {
    pub const ALL: [Feature; 31] = [
        Feature::Sma20,
        Feature::Sma50,
        Feature::Ema12,
        Feature::Ema20,
        Feature::Ema26,
        Feature::Ema50,
        Feature::Ema200,
        Feature::EmaRatio,
        Feature::SmaRatio,
        Feature::Rsi14,
        Feature::MacdLine,
        Feature::MacdSignal,
        Feature::MacdHistogram,
        Feature::Roc10,
        Feature::Momentum10,
        Feature::StochK,
        Feature::StochD,
        Feature::WilliamsR,
        Feature::Volatility20,
        Feature::Atr14,
        Feature::BbUpper,
        Feature::BbLower,
        Feature::BbPosition,
        Feature::PriceChange1,
        Feature::PriceChange2,
        Feature::PriceChange5,
        Feature::VolumeRatio,
        Feature::HourSin,
        Feature::HourCos,
        Feature::DowSin,
        Feature::DowCos,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::Sma20 => "sma_20",
            Feature::Sma50 => "sma_50",
            Feature::Ema12 => "ema_12",
            Feature::Ema20 => "ema_20",
            Feature::Ema26 => "ema_26",
            Feature::Ema50 => "ema_50",
            Feature::Ema200 => "ema_200",
            Feature::EmaRatio => "ema_ratio",
            Feature::SmaRatio => "sma_ratio",
            Feature::Rsi14 => "rsi",
            Feature::MacdLine => "macd",
            Feature::MacdSignal => "macd_signal",
            Feature::MacdHistogram => "macd_histogram",
            Feature::Roc10 => "roc",
            Feature::Momentum10 => "momentum",
            Feature::StochK => "stoch_k",
            Feature::StochD => "stoch_d",
            Feature::WilliamsR => "williams_r",
            Feature::Volatility20 => "volatility",
            Feature::Atr14 => "atr",
            Feature::BbUpper => "bb_upper",
            Feature::BbLower => "bb_lower",
            Feature::BbPosition => "bb_position",
            Feature::PriceChange1 => "price_change_1",
            Feature::PriceChange2 => "price_change_2",
            Feature::PriceChange5 => "price_change_5",
            Feature::VolumeRatio => "volume_ratio",
            Feature::HourSin => "hour_sin",
            Feature::HourCos => "hour_cos",
            Feature::DowSin => "dow_sin",
            Feature::DowCos => "dow_cos",
        }
    }

    /// Features a complete row must carry. Volume ratio only counts when the
    /// series has volume at all.
    pub fn required(with_volume: bool) -> Vec<Feature> {
        Feature::ALL
            .iter()
            .copied()
            .filter(|f| with_volume || *f != Feature::VolumeRatio)
            .collect()
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s.trim())
            .ok_or_else(|| format!("unknown feature '{s}'"))
    }
}

/// Feature values at one bar. Absent keys mean "not computable here".
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    values: BTreeMap<Feature, f64>,
}

impl FeatureVector {
    pub fn new(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self {
            timestamp,
            close,
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values.get(&feature).copied()
    }

    /// Stores `value` only if it is finite.
    pub fn set(&mut self, feature: Feature, value: Option<f64>) {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            self.values.insert(feature, v);
        }
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.values.contains_key(&feature)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn has_all(&self, features: &[Feature]) -> bool {
        features.iter().all(|f| self.contains(*f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.values.iter().map(|(f, v)| (*f, *v))
    }
}

/// Every indicator the feature set needs, computed once over a series.
pub struct FeatureFrame<'a> {
    series: &'a Series,
    sma20: IndicatorSeries,
    sma50: IndicatorSeries,
    ema12: IndicatorSeries,
    ema20: IndicatorSeries,
    ema26: IndicatorSeries,
    ema50: IndicatorSeries,
    ema200: IndicatorSeries,
    rsi: IndicatorSeries,
    macd: IndicatorSeries,
    roc: IndicatorSeries,
    momentum: IndicatorSeries,
    stochastic: IndicatorSeries,
    williams: IndicatorSeries,
    volatility: IndicatorSeries,
    atr: IndicatorSeries,
    bollinger: IndicatorSeries,
    volume_mean: Vec<Option<f64>>,
}

impl<'a> FeatureFrame<'a> {
    pub fn new(series: &'a Series) -> Self {
        let bars = series.bars();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume.unwrap_or(0.0)).collect();
        let volume_mean = if series.has_volume() {
            rolling_mean(&volumes, 20)
        } else {
            vec![None; bars.len()]
        };

        Self {
            series,
            sma20: calculate_sma(bars, 20),
            sma50: calculate_sma(bars, 50),
            ema12: calculate_ema(bars, 12),
            ema20: calculate_ema(bars, 20),
            ema26: calculate_ema(bars, 26),
            ema50: calculate_ema(bars, 50),
            ema200: calculate_ema(bars, 200),
            rsi: calculate_rsi(bars, 14),
            macd: calculate_macd(bars, 12, 26, 9),
            roc: calculate_roc(bars, 10),
            momentum: calculate_momentum(bars, 10),
            stochastic: calculate_stochastic(bars, 14, 3),
            williams: calculate_williams_r(bars, 14),
            volatility: calculate_stddev(bars, 20),
            atr: calculate_atr(bars, 14),
            bollinger: calculate_bollinger(bars, 20, 200),
            volume_mean,
        }
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Feature values at bar `index`, or `None` when out of range.
    pub fn row(&self, index: usize) -> Option<FeatureVector> {
        let bars = self.series.bars();
        let bar = bars.get(index)?;
        let mut row = FeatureVector::new(bar.timestamp, bar.close);

        let sma20 = self.sma20.simple_at(index);
        let sma50 = self.sma50.simple_at(index);
        let ema12 = self.ema12.simple_at(index);
        let ema26 = self.ema26.simple_at(index);

        row.set(Feature::Sma20, sma20);
        row.set(Feature::Sma50, sma50);
        row.set(Feature::Ema12, ema12);
        row.set(Feature::Ema20, self.ema20.simple_at(index));
        row.set(Feature::Ema26, ema26);
        row.set(Feature::Ema50, self.ema50.simple_at(index));
        row.set(Feature::Ema200, self.ema200.simple_at(index));
        row.set(Feature::EmaRatio, ratio(ema12, ema26));
        row.set(Feature::SmaRatio, ratio(sma20, sma50));
        row.set(Feature::Rsi14, self.rsi.simple_at(index));

        if let Some(IndicatorValue::Macd {
            line,
            signal,
            histogram,
        }) = self.macd.valid_at(index)
        {
            row.set(Feature::MacdLine, Some(*line));
            row.set(Feature::MacdSignal, Some(*signal));
            row.set(Feature::MacdHistogram, Some(*histogram));
        }

        row.set(Feature::Roc10, self.roc.simple_at(index));
        row.set(Feature::Momentum10, self.momentum.simple_at(index));

        if let Some(IndicatorValue::Stochastic { k, d }) = self.stochastic.valid_at(index) {
            row.set(Feature::StochK, Some(*k));
            row.set(Feature::StochD, Some(*d));
        }

        row.set(Feature::WilliamsR, self.williams.simple_at(index));
        row.set(Feature::Volatility20, self.volatility.simple_at(index));
        row.set(Feature::Atr14, self.atr.simple_at(index));

        if let Some(IndicatorValue::Bollinger { upper, lower, .. }) =
            self.bollinger.valid_at(index)
        {
            row.set(Feature::BbUpper, Some(*upper));
            row.set(Feature::BbLower, Some(*lower));
            row.set(Feature::BbPosition, band_position(bar.close, *upper, *lower));
        }

        for (feature, lag) in [
            (Feature::PriceChange1, 1),
            (Feature::PriceChange2, 2),
            (Feature::PriceChange5, 5),
        ] {
            let change = index
                .checked_sub(lag)
                .map(|j| bars[j].close)
                .and_then(|prev| ratio(Some(bar.close - prev), Some(prev)));
            row.set(feature, change);
        }

        let volume_ratio = bar
            .volume
            .zip(self.volume_mean.get(index).copied().flatten())
            .and_then(|(volume, mean)| ratio(Some(volume), Some(mean)));
        row.set(Feature::VolumeRatio, volume_ratio);

        let (hour_sin, hour_cos) = cyclical(bar.timestamp.hour() as f64, 24.0);
        let (dow_sin, dow_cos) = cyclical(
            bar.timestamp.weekday().num_days_from_monday() as f64,
            7.0,
        );
        row.set(Feature::HourSin, Some(hour_sin));
        row.set(Feature::HourCos, Some(hour_cos));
        row.set(Feature::DowSin, Some(dow_sin));
        row.set(Feature::DowCos, Some(dow_cos));

        Some(row)
    }

    pub fn last_row(&self) -> Option<FeatureVector> {
        self.len().checked_sub(1).and_then(|i| self.row(i))
    }
}

/// Feature values at the most recent bar; `None` for an empty series.
pub fn compute_features(series: &Series) -> Option<FeatureVector> {
    FeatureFrame::new(series).last_row()
}

/// One vector per bar at which the full feature set is available.
pub fn feature_rows(series: &Series) -> Vec<FeatureVector> {
    let frame = FeatureFrame::new(series);
    let required = Feature::required(series.has_volume());
    (0..frame.len())
        .filter_map(|i| frame.row(i))
        .filter(|row| row.has_all(&required))
        .collect()
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

fn cyclical(value: f64, period: f64) -> (f64, f64) {
    let angle = TAU * value / period;
    (angle.sin(), angle.cos())
}
