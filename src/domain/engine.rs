//! Per-symbol analysis pipeline.
//!
//! Fetches the three timeframes, runs the indicator engine, technical rules,
//! classifier, trend aligner and sentiment estimator, fuses them into a
//! [`Decision`] and derives [`TradeLevels`]. Any data problem turns into a
//! neutral HOLD with confidence 0.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::classifier::{ClassifierAdapter, Prediction};
use crate::domain::config::TimeframeConfig;
use crate::domain::error::FusetraderError;
use crate::domain::features::{Feature, FeatureFrame};
use crate::domain::fusion::{Decision, fuse};
use crate::domain::indicator::{atr, calculate_atr};
use crate::domain::levels::{LevelCalculator, TradeLevels};
use crate::domain::ohlcv::{Series, Timeframe};
use crate::domain::sentiment::{self, Sentiment};
use crate::domain::technical::{self, TechnicalView};
use crate::domain::trend::{self, TrendAlignment};
use crate::ports::market_data_port::MarketDataPort;

/// Short-timeframe history needed before a decision is attempted.
pub const MIN_ANALYSIS_BARS: usize = 200;

/// Bars fetched for the trailing-stop ATR.
pub const TRAILING_ATR_BARS: usize = 50;

/// Everything one evaluation produced.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub decision: Decision,
    pub technical: TechnicalView,
    pub prediction: Prediction,
    pub trend: TrendAlignment,
    pub sentiment: Sentiment,
    pub price: Option<f64>,
    pub atr: Option<f64>,
    /// `None` when the analysis fell back for lack of data.
    pub levels: Option<TradeLevels>,
}

impl Evaluation {
    fn unavailable(symbol: &str, now: DateTime<Utc>) -> Self {
        Self {
            decision: Decision::hold_fallback(symbol, now),
            technical: TechnicalView::neutral(),
            prediction: Prediction::fallback(),
            trend: TrendAlignment::from_scores(trend::TimeframeScores {
                short: 0.0,
                medium: 0.0,
                long: 0.0,
            }),
            sentiment: Sentiment::neutral(),
            price: None,
            atr: None,
            levels: None,
        }
    }
}

pub struct AnalysisEngine {
    market: Arc<dyn MarketDataPort>,
    classifier: Arc<ClassifierAdapter>,
    levels: LevelCalculator,
    timeframes: TimeframeConfig,
}

impl AnalysisEngine {
    pub fn new(
        market: Arc<dyn MarketDataPort>,
        classifier: Arc<ClassifierAdapter>,
        levels: LevelCalculator,
        timeframes: TimeframeConfig,
    ) -> Self {
        Self {
            market,
            classifier,
            levels,
            timeframes,
        }
    }

    pub fn classifier(&self) -> &Arc<ClassifierAdapter> {
        &self.classifier
    }

    pub fn evaluate(&self, symbol: &str, now: DateTime<Utc>) -> Evaluation {
        match self.try_evaluate(symbol, now) {
            Ok(evaluation) => evaluation,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "analysis unavailable, holding");
                Evaluation::unavailable(symbol, now)
            }
        }
    }

    fn try_evaluate(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, FusetraderError> {
        let tf = &self.timeframes;
        let short = self.fetch(symbol, tf.short, tf.short_bars)?;
        if short.len() < MIN_ANALYSIS_BARS {
            return Err(FusetraderError::InsufficientData {
                symbol: symbol.to_string(),
                bars: short.len(),
                minimum: MIN_ANALYSIS_BARS,
            });
        }
        let medium = self.fetch(symbol, tf.medium, tf.medium_bars)?;
        let long = self.fetch(symbol, tf.long, tf.long_bars)?;

        let frame = FeatureFrame::new(&short);
        let features = frame.last_row().ok_or_else(|| FusetraderError::InsufficientData {
            symbol: symbol.to_string(),
            bars: short.len(),
            minimum: MIN_ANALYSIS_BARS,
        })?;

        let technical = technical::analyze(&frame);
        let prediction = self.classifier.predict(&features);
        let trend = trend::align(&short, &medium, &long);
        let sentiment = sentiment::estimate(&short);

        let decision = fuse(symbol, &technical, &prediction, &trend, &sentiment, now);
        let price = features.close;
        let atr = features.get(Feature::Atr14);
        let levels = self.levels.calculate(&decision, price, atr);

        debug!(
            symbol = %symbol,
            signal = %decision.signal,
            confidence = decision.confidence,
            combined_score = decision.combined_score,
            technical = technical.score,
            classifier = %prediction.signal,
            alignment = trend.alignment,
            sentiment = sentiment.score,
            "symbol evaluated"
        );

        Ok(Evaluation {
            decision,
            technical,
            prediction,
            trend,
            sentiment,
            price: Some(price),
            atr,
            levels: Some(levels),
        })
    }

    /// ATR on the short timeframe for trailing-stop distances.
    pub fn trailing_atr(&self, symbol: &str) -> Option<f64> {
        let series = match self.fetch(symbol, self.timeframes.short, TRAILING_ATR_BARS) {
            Ok(series) => series,
            Err(e) => {
                debug!(symbol = %symbol, error = %e, "no data for trailing ATR");
                return None;
            }
        };
        calculate_atr(series.bars(), atr::DEFAULT_PERIOD).last_simple()
    }

    fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        bars: usize,
    ) -> Result<Series, FusetraderError> {
        let series = self.market.get_series(symbol, timeframe, bars)?;
        if series.is_empty() {
            return Err(FusetraderError::DataUnavailable {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            });
        }
        Ok(series)
    }
}
