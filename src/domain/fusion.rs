//! Signal Fusion Engine.
//!
//! ```text
//! combined   = 0.3·technical + 0.4·(class × classifier confidence) + 0.2·alignment + 0.1·sentiment
//! confidence = 100 × (0.3·rule confidence + 0.4·classifier confidence + 0.2·trend strength + 0.1·|sentiment|)
//! ```
//!
//! combined > 0.3 is BUY, combined < -0.3 is SELL, anything else HOLD.
//! A fallback classifier prediction contributes nothing to either sum.

use chrono::{DateTime, Utc};

use crate::domain::classifier::Prediction;
use crate::domain::sentiment::Sentiment;
use crate::domain::signal::Signal;
use crate::domain::technical::TechnicalView;
use crate::domain::trend::TrendAlignment;

pub const TECHNICAL_WEIGHT: f64 = 0.3;
pub const CLASSIFIER_WEIGHT: f64 = 0.4;
pub const TREND_WEIGHT: f64 = 0.2;
pub const SENTIMENT_WEIGHT: f64 = 0.1;

pub const BUY_THRESHOLD: f64 = 0.3;
pub const SELL_THRESHOLD: f64 = -0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentView {
    /// Signed directional value before weighting.
    pub value: f64,
    /// The component's own confidence or strength, in [0, 1].
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Components {
    pub technical: ComponentView,
    pub classifier: ComponentView,
    pub trend: ComponentView,
    pub sentiment: ComponentView,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub symbol: String,
    pub signal: Signal,
    /// In [0, 100].
    pub confidence: f64,
    pub combined_score: f64,
    pub components: Components,
    pub created_at: DateTime<Utc>,
    /// True when the classifier fell back or the whole analysis was replaced
    /// by a neutral placeholder.
    pub fallback: bool,
}

impl Decision {
    /// Neutral HOLD used when the analysis could not run at all.
    pub fn hold_fallback(symbol: &str, now: DateTime<Utc>) -> Self {
        let neutral = ComponentView {
            value: 0.0,
            confidence: 0.0,
        };
        Self {
            symbol: symbol.to_string(),
            signal: Signal::Hold,
            confidence: 0.0,
            combined_score: 0.0,
            components: Components {
                technical: neutral,
                classifier: neutral,
                trend: neutral,
                sentiment: neutral,
            },
            created_at: now,
            fallback: true,
        }
    }

    pub fn confidence_fraction(&self) -> f64 {
        (self.confidence / 100.0).clamp(0.0, 1.0)
    }
}

pub fn signal_for_score(combined_score: f64) -> Signal {
    if combined_score > BUY_THRESHOLD {
        Signal::Buy
    } else if combined_score < SELL_THRESHOLD {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

pub fn fuse(
    symbol: &str,
    technical: &TechnicalView,
    prediction: &Prediction,
    trend: &TrendAlignment,
    sentiment: &Sentiment,
    now: DateTime<Utc>,
) -> Decision {
    let classifier = if prediction.is_fallback() {
        ComponentView {
            value: 0.0,
            confidence: 0.0,
        }
    } else {
        ComponentView {
            value: prediction.signal.unit_value() * prediction.confidence,
            confidence: prediction.confidence,
        }
    };

    let components = Components {
        technical: ComponentView {
            value: technical.score,
            confidence: technical.confidence,
        },
        classifier,
        trend: ComponentView {
            value: trend.alignment,
            confidence: trend.strength,
        },
        sentiment: ComponentView {
            value: sentiment.score,
            confidence: sentiment.score.abs().min(1.0),
        },
    };

    let combined_score = weighted(&components, |c| c.value);
    let confidence = (weighted(&components, |c| c.confidence) * 100.0).clamp(0.0, 100.0);

    Decision {
        symbol: symbol.to_string(),
        signal: signal_for_score(combined_score),
        confidence,
        combined_score,
        components,
        created_at: now,
        fallback: prediction.is_fallback(),
    }
}

fn weighted(components: &Components, pick: impl Fn(&ComponentView) -> f64) -> f64 {
    TECHNICAL_WEIGHT * pick(&components.technical)
        + CLASSIFIER_WEIGHT * pick(&components.classifier)
        + TREND_WEIGHT * pick(&components.trend)
        + SENTIMENT_WEIGHT * pick(&components.sentiment)
}
