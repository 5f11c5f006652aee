//! Position Lifecycle Manager: entry gates, broker reconciliation, trailing
//! stops and early-exit detection.
//!
//! The manager owns every tracked [`Position`], keyed by symbol. Reconciliation
//! is the only place positions leave the book, which is what guarantees that a
//! closed ticket is finalized exactly once.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::account::BrokerPosition;
use crate::domain::error::RejectReason;
use crate::domain::fusion::Decision;
use crate::domain::position::{ClosedTrade, Position};
use crate::domain::session::SessionState;
use crate::domain::signal::Direction;
use crate::ports::broker_port::BrokerPort;

/// Gates checked before sizing. Margin and minimum-lot gates run in the
/// risk sizer because they need account and symbol data.
pub fn check_entry_gates(
    decision: &Decision,
    min_confidence: f64,
    max_daily_trades: u32,
    session: &SessionState,
    manager: &PositionManager,
) -> Result<Direction, RejectReason> {
    let direction = decision.signal.direction().ok_or(RejectReason::NoSignal)?;
    if decision.confidence < min_confidence {
        return Err(RejectReason::LowConfidence {
            confidence: decision.confidence,
            minimum: min_confidence,
        });
    }
    if session.daily_limit_reached(max_daily_trades) {
        return Err(RejectReason::DailyLimitReached);
    }
    if manager.contains(&decision.symbol) {
        return Err(RejectReason::PositionExists);
    }
    Ok(direction)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrailingUpdate {
    pub ticket: u64,
    pub symbol: String,
    pub previous_stop: f64,
    pub new_stop: f64,
}

/// A stop tightening proposed for a tracked position.
#[derive(Debug, Clone, PartialEq)]
pub struct StopMove {
    pub ticket: u64,
    pub symbol: String,
    pub new_stop: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PositionManager {
    positions: BTreeMap<String, Position>,
}

impl PositionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn get(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }

    /// Starts tracking an opened position. One position per symbol.
    pub fn track(&mut self, position: Position) -> Result<(), RejectReason> {
        if self.positions.contains_key(&position.symbol) {
            return Err(RejectReason::PositionExists);
        }
        self.positions.insert(position.symbol.clone(), position);
        Ok(())
    }

    /// Refreshes prices and stops from the broker report and stops tracking
    /// every position whose ticket the broker no longer reports. The removed
    /// positions are returned for [`finalize`]; no broker calls are made.
    pub fn sync(&mut self, reported: &[BrokerPosition]) -> Vec<Position> {
        let open_tickets: HashSet<u64> = reported.iter().map(|p| p.ticket).collect();

        for report in reported {
            if let Some(position) = self
                .positions
                .get_mut(&report.symbol)
                .filter(|p| p.ticket == report.ticket)
            {
                position.observe_price(report.current_price);
                position.sync_stop(report.stop_loss);
            }
        }

        let gone: Vec<String> = self
            .positions
            .iter()
            .filter(|(_, p)| !open_tickets.contains(&p.ticket))
            .map(|(symbol, _)| symbol.clone())
            .collect();
        gone.into_iter()
            .filter_map(|symbol| self.positions.remove(&symbol))
            .collect()
    }

    /// [`sync`](Self::sync) followed by [`finalize`] for each removed position.
    pub fn reconcile(
        &mut self,
        reported: &[BrokerPosition],
        broker: &dyn BrokerPort,
        now: DateTime<Utc>,
    ) -> Vec<ClosedTrade> {
        self.sync(reported)
            .into_iter()
            .map(|position| finalize(position, broker, now))
            .collect()
    }

    /// Stop moves due for positions whose profit exceeds `ATR × multiplier`.
    /// `atr_for` returns `None` when ATR cannot be computed; such positions
    /// are left alone this cycle.
    pub fn trailing_candidates<F>(&self, mut atr_for: F, atr_multiplier: f64) -> Vec<StopMove>
    where
        F: FnMut(&str) -> Option<f64>,
    {
        let mut moves = Vec::new();
        for position in self.positions.values() {
            let Some(atr) = atr_for(&position.symbol) else {
                debug!(symbol = %position.symbol, "no ATR, trailing skipped");
                continue;
            };
            let distance = atr * atr_multiplier;
            if let Some(new_stop) = position.trailing_candidate(position.last_price, distance) {
                moves.push(StopMove {
                    ticket: position.ticket,
                    symbol: position.symbol.clone(),
                    new_stop,
                });
            }
        }
        moves
    }

    /// Applies a stop move the broker has accepted. `None` when the position
    /// is gone or the move no longer tightens the stop.
    pub fn confirm_stop_move(&mut self, accepted: &StopMove) -> Option<TrailingUpdate> {
        let position = self
            .positions
            .get_mut(&accepted.symbol)
            .filter(|p| p.ticket == accepted.ticket)?;
        let previous_stop = position.stop_loss;
        if !position.apply_trailing_stop(accepted.new_stop) {
            return None;
        }
        info!(
            symbol = %position.symbol,
            ticket = position.ticket,
            previous_stop,
            new_stop = accepted.new_stop,
            "trailing stop moved"
        );
        Some(TrailingUpdate {
            ticket: position.ticket,
            symbol: position.symbol.clone(),
            previous_stop,
            new_stop: accepted.new_stop,
        })
    }

    /// [`trailing_candidates`](Self::trailing_candidates), sent through
    /// [`submit_stop_moves`] and confirmed in place.
    pub fn apply_trailing<F>(
        &mut self,
        atr_for: F,
        atr_multiplier: f64,
        broker: &dyn BrokerPort,
    ) -> Vec<TrailingUpdate>
    where
        F: FnMut(&str) -> Option<f64>,
    {
        let moves = self.trailing_candidates(atr_for, atr_multiplier);
        submit_stop_moves(moves, broker)
            .iter()
            .filter_map(|accepted| self.confirm_stop_move(accepted))
            .collect()
    }

    /// True when `decision` points the other way from the held position with
    /// confidence above `threshold`. The flag is advisory only.
    pub fn early_exit_flag(&self, decision: &Decision, threshold: f64) -> bool {
        let Some(position) = self.positions.get(&decision.symbol) else {
            return false;
        };
        decision.signal.direction() == Some(position.direction.opposite())
            && decision.confidence > threshold
    }
}

/// Asks the broker to move each stop and keeps the moves it accepted.
pub fn submit_stop_moves(moves: Vec<StopMove>, broker: &dyn BrokerPort) -> Vec<StopMove> {
    moves
        .into_iter()
        .filter(|m| match broker.modify_stop(m.ticket, m.new_stop) {
            Ok(true) => true,
            Ok(false) => {
                warn!(symbol = %m.symbol, ticket = m.ticket, "broker declined stop change");
                false
            }
            Err(e) => {
                warn!(
                    symbol = %m.symbol,
                    ticket = m.ticket,
                    error = %e,
                    "stop change failed"
                );
                false
            }
        })
        .collect()
}

/// Turns a position the broker no longer reports into a [`ClosedTrade`].
///
/// Exit price and P&L come from the broker's closure record when one
/// exists. Otherwise the last observed price is used and the trade is
/// flagged for audit.
pub fn finalize(position: Position, broker: &dyn BrokerPort, now: DateTime<Utc>) -> ClosedTrade {
    let deal = match broker.closed_deal(position.ticket) {
        Ok(deal) => deal,
        Err(e) => {
            warn!(ticket = position.ticket, error = %e, "closed deal lookup failed");
            None
        }
    };

    let trade = match deal {
        Some(deal) => position.close(deal.exit_price, deal.profit, deal.closed_at, false),
        None => {
            let price = position.last_price;
            let pnl = position.estimated_pnl(price);
            warn!(
                symbol = %position.symbol,
                ticket = position.ticket,
                price,
                "position vanished without closure record, flagged for audit"
            );
            position.close(price, pnl, now, true)
        }
    };

    info!(
        symbol = %trade.symbol,
        ticket = trade.ticket,
        exit_price = trade.exit_price,
        pnl = trade.pnl,
        needs_audit = trade.needs_audit,
        "position closed"
    );
    trade
}
