//! Per-position state machine.
//!
//! ```text
//! PROPOSED --open--> OPEN --trail--> TRAILING_ADJUSTED --trail--> ...
//!                      \                   /
//!                       +-----close-------+--> CLOSED
//! ```
//!
//! A [`Proposal`] becomes a [`Position`] only through [`Position::open`], and a
//! position turns into a [`ClosedTrade`] only through [`Position::close`],
//! which consumes it.

use chrono::{DateTime, Utc};

use crate::domain::account::SymbolConstraints;
use crate::domain::fusion::Decision;
use crate::domain::levels::TradeLevels;
use crate::domain::signal::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Proposed,
    Open,
    TrailingAdjusted,
    Closed,
}

/// A sized trade that passed every gate but has not been submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub symbol: String,
    pub direction: Direction,
    pub levels: TradeLevels,
    pub lots: f64,
    pub constraints: SymbolConstraints,
    pub decision: Decision,
}

impl Proposal {
    pub fn state(&self) -> PositionState {
        PositionState::Proposed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub ticket: u64,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub size: f64,
    pub entry_time: DateTime<Utc>,
    pub decision: Decision,
    pub last_price: f64,
    pub trailing_adjustments: u32,
    tick_size: f64,
    point_value: f64,
    state: PositionState,
}

impl Position {
    /// PROPOSED → OPEN using the broker's fill.
    pub fn open(proposal: Proposal, ticket: u64, filled_price: f64, now: DateTime<Utc>) -> Self {
        Self {
            ticket,
            symbol: proposal.symbol,
            direction: proposal.direction,
            entry_price: filled_price,
            stop_loss: proposal.levels.stop_loss,
            take_profit: proposal.levels.take_profit,
            size: proposal.lots,
            entry_time: now,
            decision: proposal.decision,
            last_price: filled_price,
            trailing_adjustments: 0,
            tick_size: proposal.constraints.tick_size,
            point_value: proposal.constraints.point_value,
            state: PositionState::Open,
        }
    }

    pub fn state(&self) -> PositionState {
        self.state
    }

    pub fn is_long(&self) -> bool {
        self.direction == Direction::Buy
    }

    /// Price move in the position's favour (negative when losing).
    pub fn favourable_move(&self, price: f64) -> f64 {
        self.direction.sign() * (price - self.entry_price)
    }

    /// Monetary P&L at `price` from tick size and point value.
    pub fn estimated_pnl(&self, price: f64) -> f64 {
        if self.tick_size <= 0.0 {
            return 0.0;
        }
        self.favourable_move(price) / self.tick_size * self.point_value * self.size
    }

    pub fn observe_price(&mut self, price: f64) {
        if price.is_finite() && price > 0.0 {
            self.last_price = price;
        }
    }

    /// The stop a trailing update would move to, if the move is allowed:
    /// profit must exceed `distance` and the stop may only tighten.
    pub fn trailing_candidate(&self, price: f64, distance: f64) -> Option<f64> {
        if !(distance > 0.0) || self.favourable_move(price) <= distance {
            return None;
        }
        let candidate = price - self.direction.sign() * distance;
        self.tightens(candidate).then_some(candidate)
    }

    /// OPEN/TRAILING_ADJUSTED → TRAILING_ADJUSTED. Refuses a looser stop.
    pub fn apply_trailing_stop(&mut self, new_stop: f64) -> bool {
        if !self.tightens(new_stop) {
            return false;
        }
        self.stop_loss = new_stop;
        self.trailing_adjustments += 1;
        self.state = PositionState::TrailingAdjusted;
        true
    }

    /// Adopts a broker-side stop when it is tighter than the tracked one.
    pub fn sync_stop(&mut self, broker_stop: f64) {
        if broker_stop > 0.0 && self.tightens(broker_stop) {
            self.stop_loss = broker_stop;
        }
    }

    fn tightens(&self, stop: f64) -> bool {
        if !stop.is_finite() {
            return false;
        }
        match self.direction {
            Direction::Buy => stop > self.stop_loss,
            Direction::Sell => self.stop_loss <= 0.0 || stop < self.stop_loss,
        }
    }

    pub fn should_stop_loss(&self, price: f64) -> bool {
        if self.stop_loss <= 0.0 {
            return false;
        }
        if self.is_long() {
            price <= self.stop_loss
        } else {
            price >= self.stop_loss
        }
    }

    pub fn should_take_profit(&self, price: f64) -> bool {
        if self.take_profit <= 0.0 {
            return false;
        }
        if self.is_long() {
            price >= self.take_profit
        } else {
            price <= self.take_profit
        }
    }

    /// → CLOSED. Consumes the position so it cannot be finalized twice.
    pub fn close(
        self,
        exit_price: f64,
        pnl: f64,
        exit_time: DateTime<Utc>,
        needs_audit: bool,
    ) -> ClosedTrade {
        ClosedTrade {
            ticket: self.ticket,
            symbol: self.symbol,
            direction: self.direction,
            size: self.size,
            entry_price: self.entry_price,
            exit_price,
            entry_time: self.entry_time,
            exit_time,
            pnl,
            confidence: self.decision.confidence,
            trailing_adjustments: self.trailing_adjustments,
            needs_audit,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub ticket: u64,
    pub symbol: String,
    pub direction: Direction,
    pub size: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub pnl: f64,
    pub confidence: f64,
    pub trailing_adjustments: u32,
    /// Closed without a broker closure record; the price is a best guess.
    pub needs_audit: bool,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.exit_time - self.entry_time).num_minutes()
    }

    pub fn state(&self) -> PositionState {
        PositionState::Closed
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::signal::Signal;
    use chrono::TimeZone;

    pub fn gold_constraints() -> SymbolConstraints {
        SymbolConstraints {
            min_lot: 0.01,
            max_lot: 100.0,
            lot_step: 0.01,
            point_value: 1.0,
            tick_size: 0.01,
        }
    }

    pub fn proposal(direction: Direction, entry: f64, stop: f64, target: f64) -> Proposal {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let mut decision = Decision::hold_fallback("XAUUSD", now);
        decision.signal = direction.as_signal();
        decision.confidence = 85.0;
        debug_assert_ne!(decision.signal, Signal::Hold);
        Proposal {
            symbol: "XAUUSD".to_string(),
            direction,
            levels: TradeLevels {
                entry,
                stop_loss: stop,
                take_profit: target,
                atr: (entry - stop).abs() / 2.0,
                stop_distance: (entry - stop).abs(),
                target_distance: (target - entry).abs(),
                risk_reward_ratio: (target - entry).abs() / (entry - stop).abs(),
            },
            lots: 0.5,
            constraints: gold_constraints(),
            decision,
        }
    }

    pub fn open_position(direction: Direction, entry: f64, stop: f64, target: f64) -> Position {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        Position::open(proposal(direction, entry, stop, target), 1001, entry, now)
    }
}
