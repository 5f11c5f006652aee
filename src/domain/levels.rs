//! Level Calculator: entry, stop-loss and take-profit from a decision and ATR.

use std::collections::HashMap;

use crate::domain::fusion::Decision;
use crate::domain::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeLevels {
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub atr: f64,
    pub stop_distance: f64,
    pub target_distance: f64,
    /// target_distance / stop_distance; 0 marks unsizeable levels.
    pub risk_reward_ratio: f64,
}

impl TradeLevels {
    /// Placeholder where entry, stop and target all equal `price`.
    pub fn flat(price: f64, atr: f64) -> Self {
        Self {
            entry: price,
            stop_loss: price,
            take_profit: price,
            atr,
            stop_distance: 0.0,
            target_distance: 0.0,
            risk_reward_ratio: 0.0,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.stop_distance > 0.0 && self.risk_reward_ratio > 0.0
    }
}

/// Per-symbol ATR multipliers with a default for unknown symbols.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelCalculator {
    multipliers: HashMap<String, f64>,
    default_multiplier: f64,
}

impl LevelCalculator {
    pub fn new(multipliers: HashMap<String, f64>, default_multiplier: f64) -> Self {
        Self {
            multipliers,
            default_multiplier,
        }
    }

    pub fn multiplier_for(&self, symbol: &str) -> f64 {
        self.multipliers
            .get(symbol)
            .copied()
            .unwrap_or(self.default_multiplier)
    }

    /// `atr` of `None` (not enough history) yields a zero stop distance.
    pub fn calculate(&self, decision: &Decision, price: f64, atr: Option<f64>) -> TradeLevels {
        let atr = atr.filter(|a| a.is_finite() && *a >= 0.0).unwrap_or(0.0);
        let sign = match decision.signal {
            Signal::Buy => 1.0,
            Signal::Sell => -1.0,
            Signal::Hold => return TradeLevels::flat(price, atr),
        };

        let cf = decision.confidence_fraction();
        let stop_distance = atr * self.multiplier_for(&decision.symbol) * (2.0 - cf);
        let target_distance = stop_distance * (1.5 + cf);
        let risk_reward_ratio = if stop_distance > 0.0 {
            target_distance / stop_distance
        } else {
            0.0
        };

        TradeLevels {
            entry: price,
            stop_loss: price - sign * stop_distance,
            take_profit: price + sign * target_distance,
            atr,
            stop_distance,
            target_distance,
            risk_reward_ratio,
        }
    }
}

impl Default for LevelCalculator {
    fn default() -> Self {
        let multipliers = [
            ("XAUUSD", 2.0),
            ("EURUSD", 1.5),
            ("GBPUSD", 1.5),
            ("BTCUSD", 3.0),
        ]
        .into_iter()
        .map(|(s, m)| (s.to_string(), m))
        .collect();
        Self::new(multipliers, 2.0)
    }
}
