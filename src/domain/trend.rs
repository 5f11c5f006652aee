//! Multi-timeframe trend alignment.
//!
//! Per timeframe the trend score compares EMA20 against EMA50:
//!
//! - EMA20 > EMA50: `min(1, 100 * (ema20 - ema50) / ema50)`
//! - otherwise:     `max(-1, -100 * (ema50 - ema20) / ema20)`
//!
//! Scores are combined with weights long 0.5, medium 0.3, short 0.2.

use crate::domain::indicator::calculate_ema;
use crate::domain::ohlcv::Series;

pub const SHORT_WEIGHT: f64 = 0.2;
pub const MEDIUM_WEIGHT: f64 = 0.3;
pub const LONG_WEIGHT: f64 = 0.5;

const FAST_SPAN: usize = 20;
const SLOW_SPAN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeframeScores {
    pub short: f64,
    pub medium: f64,
    pub long: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendAlignment {
    pub alignment: f64,
    pub scores: TimeframeScores,
    /// True only when all three scores are strictly the same sign.
    pub aligned: bool,
    pub strength: f64,
}

impl TrendAlignment {
    pub fn from_scores(scores: TimeframeScores) -> Self {
        let alignment =
            scores.long * LONG_WEIGHT + scores.medium * MEDIUM_WEIGHT + scores.short * SHORT_WEIGHT;
        let all = [scores.short, scores.medium, scores.long];
        let aligned = all.iter().all(|s| *s > 0.0) || all.iter().all(|s| *s < 0.0);
        Self {
            alignment,
            scores,
            aligned,
            strength: alignment.abs(),
        }
    }
}

/// Trend score for a single fast/slow EMA pair.
pub fn trend_score(fast: f64, slow: f64) -> f64 {
    if fast > slow {
        if slow == 0.0 {
            return 1.0;
        }
        (100.0 * (fast - slow) / slow).min(1.0)
    } else {
        if fast == 0.0 {
            return if slow == 0.0 { 0.0 } else { -1.0 };
        }
        (-100.0 * (slow - fast) / fast).max(-1.0)
    }
}

/// Trend score for the last bar of a series; 0 when EMA50 is not yet defined.
pub fn series_score(series: &Series) -> f64 {
    let fast = calculate_ema(series.bars(), FAST_SPAN).last_simple();
    let slow = calculate_ema(series.bars(), SLOW_SPAN).last_simple();
    match (fast, slow) {
        (Some(fast), Some(slow)) => trend_score(fast, slow),
        _ => 0.0,
    }
}

pub fn align(short: &Series, medium: &Series, long: &Series) -> TrendAlignment {
    TrendAlignment::from_scores(TimeframeScores {
        short: series_score(short),
        medium: series_score(medium),
        long: series_score(long),
    })
}
