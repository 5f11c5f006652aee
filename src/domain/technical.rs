//! Traditional rule-based technical analysis.
//!
//! Each rule that fires contributes a (value, weight) pair:
//!
//! | rule                         | value | weight |
//! |------------------------------|-------|--------|
//! | EMA20 > EMA50 > EMA200       | +1.0  | 0.8    |
//! | EMA20 > EMA50                | +0.5  | 0.6    |
//! | EMA20 < EMA50 < EMA200       | -1.0  | 0.8    |
//! | EMA20 < EMA50                | -0.5  | 0.6    |
//! | RSI < 30                     | +0.7  | 0.7    |
//! | RSI > 70                     | -0.7  | 0.7    |
//! | 45 < RSI < 55                |  0.0  | 0.3    |
//! | MACD crosses above signal    | +0.8  | 0.7    |
//! | MACD crosses below signal    | -0.8  | 0.7    |
//! | close < lower Bollinger band | +0.6  | 0.6    |
//! | close > upper Bollinger band | -0.6  | 0.6    |
//!
//! score = Σ(value·weight)/Σweight and confidence = Σ(|value|·weight)/Σweight,
//! both 0 when no rule fires. Rules whose inputs are withheld do not fire.

use crate::domain::features::{Feature, FeatureFrame, FeatureVector};

#[derive(Debug, Clone, PartialEq)]
pub struct RuleHit {
    pub name: &'static str,
    pub value: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TechnicalView {
    /// Weighted directional score in [-1, 1].
    pub score: f64,
    /// Weighted rule strength in [0, 1].
    pub confidence: f64,
    pub signals: Vec<RuleHit>,
}

impl TechnicalView {
    pub fn neutral() -> Self {
        Self {
            score: 0.0,
            confidence: 0.0,
            signals: Vec::new(),
        }
    }
}

/// Runs the rule set on the last bar of `frame`.
pub fn analyze(frame: &FeatureFrame<'_>) -> TechnicalView {
    let Some(last) = frame.last_row() else {
        return TechnicalView::neutral();
    };
    let previous = frame.len().checked_sub(2).and_then(|i| frame.row(i));
    evaluate_rules(&last, previous.as_ref())
}

pub fn evaluate_rules(current: &FeatureVector, previous: Option<&FeatureVector>) -> TechnicalView {
    let mut hits = Vec::new();
    let mut hit = |name, value, weight| hits.push(RuleHit { name, value, weight });

    let ema20 = current.get(Feature::Ema20);
    let ema50 = current.get(Feature::Ema50);
    let ema200 = current.get(Feature::Ema200);

    if let (Some(e20), Some(e50)) = (ema20, ema50) {
        match ema200 {
            Some(e200) if e20 > e50 && e50 > e200 => hit("strong_uptrend", 1.0, 0.8),
            Some(e200) if e20 < e50 && e50 < e200 => hit("strong_downtrend", -1.0, 0.8),
            _ if e20 > e50 => hit("uptrend", 0.5, 0.6),
            _ if e20 < e50 => hit("downtrend", -0.5, 0.6),
            _ => {}
        }
    }

    if let Some(rsi) = current.get(Feature::Rsi14) {
        if rsi < 30.0 {
            hit("rsi_oversold", 0.7, 0.7);
        } else if rsi > 70.0 {
            hit("rsi_overbought", -0.7, 0.7);
        } else if rsi > 45.0 && rsi < 55.0 {
            hit("rsi_neutral", 0.0, 0.3);
        }
    }

    let macd_now = macd_pair(current);
    let macd_prev = previous.and_then(macd_pair);
    if let (Some((line, signal)), Some((prev_line, prev_signal))) = (macd_now, macd_prev) {
        if line > signal && prev_line <= prev_signal {
            hit("macd_bullish_cross", 0.8, 0.7);
        } else if line < signal && prev_line >= prev_signal {
            hit("macd_bearish_cross", -0.8, 0.7);
        }
    }

    if let (Some(upper), Some(lower)) =
        (current.get(Feature::BbUpper), current.get(Feature::BbLower))
    {
        if current.close < lower {
            hit("below_lower_band", 0.6, 0.6);
        } else if current.close > upper {
            hit("above_upper_band", -0.6, 0.6);
        }
    }

    summarize(hits)
}

fn macd_pair(row: &FeatureVector) -> Option<(f64, f64)> {
    row.get(Feature::MacdLine).zip(row.get(Feature::MacdSignal))
}

fn summarize(signals: Vec<RuleHit>) -> TechnicalView {
    let total_weight: f64 = signals.iter().map(|s| s.weight).sum();
    if total_weight <= 0.0 {
        return TechnicalView::neutral();
    }
    let score = signals.iter().map(|s| s.value * s.weight).sum::<f64>() / total_weight;
    let confidence = signals.iter().map(|s| s.value.abs() * s.weight).sum::<f64>() / total_weight;
    TechnicalView {
        score,
        confidence,
        signals,
    }
}
