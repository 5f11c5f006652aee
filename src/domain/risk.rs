//! Risk Sizer: turns a decision and its levels into a lot size.
//!
//! 1. risk fraction = base × (0.5 + 0.5 × confidence fraction)
//! 2. trailing win rate below `low_win_rate` halves it, above `high_win_rate`
//!    scales it by 1.2
//! 3. lots = balance × fraction / (stop distance in ticks × point value)
//! 4. clamp to [min_lot, max_lot], round to the nearest lot step

use tracing::debug;

use crate::domain::account::{AccountSnapshot, SymbolConstraints};
use crate::domain::config::RiskConfig;
use crate::domain::error::RejectReason;
use crate::domain::fusion::Decision;
use crate::domain::levels::TradeLevels;

pub const LOW_WIN_RATE_FACTOR: f64 = 0.5;
pub const HIGH_WIN_RATE_FACTOR: f64 = 1.2;

const LOT_EPSILON: f64 = 1e-9;

/// Trailing trade statistics. `win_rate` is a fraction in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceStats {
    pub trade_count: u32,
    pub win_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSize {
    pub lots: f64,
    pub risk_fraction: f64,
    pub risk_amount: f64,
    pub stop_ticks: f64,
}

#[derive(Debug, Clone)]
pub struct RiskSizer {
    config: RiskConfig,
}

impl RiskSizer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Risk fraction after confidence scaling and the win-rate throttle.
    /// Empty history (no trades) leaves the fraction unadjusted.
    pub fn risk_fraction(
        &self,
        confidence_fraction: f64,
        performance: Option<&PerformanceStats>,
    ) -> f64 {
        let cf = confidence_fraction.clamp(0.0, 1.0);
        let mut fraction = self.config.risk_per_trade * (0.5 + 0.5 * cf);
        if let Some(stats) = performance.filter(|s| s.trade_count > 0) {
            if stats.win_rate < self.config.low_win_rate {
                fraction *= LOW_WIN_RATE_FACTOR;
            } else if stats.win_rate > self.config.high_win_rate {
                fraction *= HIGH_WIN_RATE_FACTOR;
            }
        }
        fraction
    }

    pub fn size(
        &self,
        decision: &Decision,
        levels: &TradeLevels,
        account: &AccountSnapshot,
        constraints: &SymbolConstraints,
        performance: Option<&PerformanceStats>,
    ) -> Result<PositionSize, RejectReason> {
        constraints
            .validate()
            .map_err(|reason| RejectReason::InvalidConstraints { reason })?;

        if !(levels.stop_distance > 0.0) {
            return Err(RejectReason::ZeroStopDistance);
        }
        if account.free_margin < self.config.min_free_margin {
            return Err(RejectReason::InsufficientMargin {
                free_margin: account.free_margin,
                floor: self.config.min_free_margin,
            });
        }
        if !(account.balance > 0.0) {
            return Err(RejectReason::AccountUnavailable {
                reason: format!("non-positive balance {}", account.balance),
            });
        }

        let risk_fraction = self.risk_fraction(decision.confidence_fraction(), performance);
        let risk_amount = account.balance * risk_fraction;
        let stop_ticks = levels.stop_distance / constraints.tick_size;
        let raw = risk_amount / (stop_ticks * constraints.point_value);
        let lots = round_to_step(raw, constraints)?;

        debug!(
            symbol = %decision.symbol,
            risk_fraction,
            risk_amount,
            stop_ticks,
            raw_lots = raw,
            lots,
            "position sized"
        );

        Ok(PositionSize {
            lots,
            risk_fraction,
            risk_amount,
            stop_ticks,
        })
    }
}

/// Clamps to the lot bounds and snaps to the nearest multiple of the lot step
/// that stays inside them.
pub fn round_to_step(lots: f64, c: &SymbolConstraints) -> Result<f64, RejectReason> {
    if !lots.is_finite() {
        return Err(RejectReason::LotTooSmall {
            lots,
            min_lot: c.min_lot,
        });
    }

    let clamped = lots.clamp(c.min_lot, c.max_lot);
    let mut steps = (clamped / c.lot_step).round();
    if steps * c.lot_step > c.max_lot + LOT_EPSILON {
        steps = (c.max_lot / c.lot_step + LOT_EPSILON).floor();
    }
    if steps * c.lot_step < c.min_lot - LOT_EPSILON {
        steps = (c.min_lot / c.lot_step - LOT_EPSILON).ceil();
    }

    let rounded = clean(steps * c.lot_step);
    if rounded < c.min_lot - LOT_EPSILON || rounded > c.max_lot + LOT_EPSILON || rounded <= 0.0 {
        return Err(RejectReason::LotTooSmall {
            lots: rounded,
            min_lot: c.min_lot,
        });
    }
    Ok(rounded)
}

fn clean(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}
