//! Market sentiment heuristic from volatility, momentum and volume.

use crate::domain::indicator::stddev::population_stddev;
use crate::domain::ohlcv::Series;

pub const RECENT_BARS: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Sentiment {
    /// 0.4·momentum + 0.3·volume_trend + 0.3·(1 − volatility_ratio)
    pub score: f64,
    pub volatility_ratio: f64,
    /// Fractional close change over the last 20 bars (0.02 = +2%).
    pub price_momentum: f64,
    pub volume_trend: f64,
}

impl Sentiment {
    pub fn neutral() -> Self {
        Self {
            score: 0.0,
            volatility_ratio: 1.0,
            price_momentum: 0.0,
            volume_trend: 0.0,
        }
    }
}

pub fn estimate(series: &Series) -> Sentiment {
    let closes = series.closes();
    if closes.len() < 2 {
        return Sentiment::neutral();
    }

    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    let recent_returns = &returns[returns.len().saturating_sub(RECENT_BARS)..];
    let overall_vol = population_stddev(&returns);
    let volatility_ratio = if overall_vol > 0.0 {
        population_stddev(recent_returns) / overall_vol
    } else {
        1.0
    };

    let price_momentum = closes
        .len()
        .checked_sub(RECENT_BARS + 1)
        .map(|i| closes[i])
        .filter(|base| *base != 0.0)
        .and_then(|base| closes.last().map(|last| (last - base) / base))
        .unwrap_or(0.0);

    let volume_trend = if series.has_volume() {
        let volumes: Vec<f64> = series
            .bars()
            .iter()
            .filter_map(|b| b.volume)
            .collect();
        let recent = &volumes[volumes.len().saturating_sub(RECENT_BARS)..];
        let overall = mean(&volumes);
        if overall > 0.0 {
            (mean(recent) - overall) / overall
        } else {
            0.0
        }
    } else {
        0.0
    };

    let score = 0.4 * price_momentum + 0.3 * volume_trend + 0.3 * (1.0 - volatility_ratio);
    Sentiment {
        score,
        volatility_ratio,
        price_momentum,
        volume_trend,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
