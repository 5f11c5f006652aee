//! Cycle Scheduler.
//!
//! One cycle:
//!
//! 1. advance the session date (daily reset, weekly retrain trigger)
//! 2. reconcile tracked positions against the broker and trail stops
//! 3. evaluate each configured symbol in order, gate, size and submit
//!
//! Failures inside a symbol are logged and the cycle moves on. Only the
//! [`StopSignal`] or a cycle limit ends the loop, and an empty symbol list
//! refuses to start it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::domain::classifier::ClassifierAdapter;
use crate::domain::config::AppConfig;
use crate::domain::engine::{AnalysisEngine, Evaluation};
use crate::domain::error::{FusetraderError, RejectReason};
use crate::domain::fusion::Decision;
use crate::domain::levels::LevelCalculator;
use crate::domain::lifecycle::{
    PositionManager, TrailingUpdate, check_entry_gates, finalize, submit_stop_moves,
};
use crate::domain::position::{ClosedTrade, Position, Proposal};
use crate::domain::risk::{PerformanceStats, RiskSizer};
use crate::domain::session::{DayRollover, SessionState, SessionTotals};
use crate::domain::signal::{Direction, Signal};
use crate::ports::broker_port::{BrokerPort, ExecutionPort, OrderRequest};
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::model_port::ModelStore;
use crate::ports::performance_port::{PerformancePort, TradeJournal};

/// Cooperative cancellation shared between the loop and whoever stops it.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        *self.stopped.lock() = true;
        self.condvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    /// Sleeps up to `timeout`, waking early on stop. Returns whether stop was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            self.condvar.wait_for(&mut stopped, timeout);
        }
        *stopped
    }
}

/// External collaborators the scheduler drives.
#[derive(Clone)]
pub struct SchedulerPorts {
    pub market: Arc<dyn MarketDataPort>,
    pub broker: Arc<dyn BrokerPort>,
    pub execution: Arc<dyn ExecutionPort>,
    pub performance: Option<Arc<dyn PerformancePort>>,
    pub journal: Option<Arc<dyn TradeJournal>>,
    pub model_store: Option<Arc<dyn ModelStore>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    Hold,
    Rejected(RejectReason),
    ExecutionFailed(String),
    Opened { ticket: u64, lots: f64 },
}

#[derive(Debug, Clone)]
pub struct SymbolReport {
    pub symbol: String,
    pub decision: Decision,
    pub outcome: SymbolOutcome,
    pub early_exit: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub closed: Vec<ClosedTrade>,
    pub trailing: Vec<TrailingUpdate>,
    pub symbols: Vec<SymbolReport>,
    pub retrain_started: bool,
    /// Stop was requested before every symbol was evaluated.
    pub interrupted: bool,
}

impl CycleReport {
    pub fn opened(&self) -> usize {
        self.symbols
            .iter()
            .filter(|r| matches!(r.outcome, SymbolOutcome::Opened { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionSummary {
    pub signal: Signal,
    pub confidence: f64,
    pub at: DateTime<Utc>,
}

/// Read-only view for status queries.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub daily_trade_count: u32,
    pub totals: SessionTotals,
    pub active_symbols: Vec<String>,
    pub classifier_ready: bool,
    pub classifier_retraining: bool,
    pub last_decisions: BTreeMap<String, DecisionSummary>,
}

struct SharedState {
    session: SessionState,
    positions: PositionManager,
    last_decisions: BTreeMap<String, DecisionSummary>,
}

pub struct Scheduler {
    config: AppConfig,
    engine: AnalysisEngine,
    sizer: RiskSizer,
    ports: SchedulerPorts,
    state: RwLock<SharedState>,
}

impl Scheduler {
    /// Builds the scheduler and loads the initial model when a store is given.
    pub fn new(config: AppConfig, ports: SchedulerPorts, started_at: DateTime<Utc>) -> Self {
        let classifier = Arc::new(ClassifierAdapter::new());
        if let Some(store) = &ports.model_store {
            classifier.load_from(store.as_ref());
        }
        Self::with_classifier(config, ports, classifier, started_at)
    }

    pub fn with_classifier(
        config: AppConfig,
        ports: SchedulerPorts,
        classifier: Arc<ClassifierAdapter>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let engine = AnalysisEngine::new(
            Arc::clone(&ports.market),
            classifier,
            LevelCalculator::from(config.levels.clone()),
            config.timeframes,
        );
        let sizer = RiskSizer::new(config.risk.clone());
        Self {
            config,
            engine,
            sizer,
            ports,
            state: RwLock::new(SharedState {
                session: SessionState::new(started_at.date_naive()),
                positions: PositionManager::new(),
                last_decisions: BTreeMap::new(),
            }),
        }
    }

    pub fn classifier(&self) -> &Arc<ClassifierAdapter> {
        self.engine.classifier()
    }

    pub fn engine(&self) -> &AnalysisEngine {
        &self.engine
    }

    pub fn status(&self) -> StatusSnapshot {
        let state = self.state.read();
        StatusSnapshot {
            daily_trade_count: state.session.daily_trade_count(),
            totals: *state.session.totals(),
            active_symbols: state.positions.symbols(),
            classifier_ready: self.classifier().is_ready(),
            classifier_retraining: self.classifier().is_retraining(),
            last_decisions: state.last_decisions.clone(),
        }
    }

    /// Open positions as currently tracked.
    pub fn positions(&self) -> Vec<Position> {
        self.state.read().positions.positions().cloned().collect()
    }

    /// Runs cycles until `stop` fires or `max_cycles` is reached.
    /// Returns the number of completed cycles. Refuses to start without
    /// symbols.
    pub fn run(&self, stop: &StopSignal, max_cycles: Option<u64>) -> Result<u64, FusetraderError> {
        if self.config.engine.symbols.is_empty() {
            return Err(FusetraderError::ConfigMissing {
                section: "engine".to_string(),
                key: "symbols".to_string(),
            });
        }
        info!(
            symbols = ?self.config.engine.symbols,
            interval_secs = self.config.engine.interval.as_secs(),
            "scheduler started"
        );
        let mut cycles = 0;
        loop {
            if stop.is_stopped() {
                break;
            }
            let report = self.run_cycle(Utc::now(), stop);
            cycles += 1;
            debug!(
                cycle = cycles,
                opened = report.opened(),
                closed = report.closed.len(),
                "cycle finished"
            );

            if report.interrupted || max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }
            if stop.wait(self.config.engine.interval) {
                break;
            }
        }
        self.log_session_summary();
        Ok(cycles)
    }

    pub fn run_cycle(&self, now: DateTime<Utc>, stop: &StopSignal) -> CycleReport {
        let mut report = CycleReport {
            retrain_started: self.roll_session(now),
            ..CycleReport::default()
        };

        report.closed = self.reconcile(now);
        report.trailing = self.trail_stops();

        for symbol in &self.config.engine.symbols {
            if stop.is_stopped() {
                info!("stop requested, ending cycle early");
                report.interrupted = true;
                break;
            }
            report.symbols.push(self.process_symbol(symbol, now));
        }
        report
    }

    fn roll_session(&self, now: DateTime<Utc>) -> bool {
        let rollover = self
            .state
            .write()
            .session
            .advance_to(now.date_naive(), self.config.engine.retrain_weekday);

        let DayRollover::NewDay { retrain } = rollover else {
            return false;
        };
        info!(date = %now.date_naive(), "new trading day, daily counters reset");
        if !retrain {
            return false;
        }
        match &self.ports.model_store {
            Some(store) => self.classifier().spawn_retrain(Arc::clone(store)).is_some(),
            None => {
                debug!("retrain day but no model store configured");
                false
            }
        }
    }

    fn reconcile(&self, now: DateTime<Utc>) -> Vec<ClosedTrade> {
        let reported = match self.ports.broker.open_positions() {
            Ok(reported) => reported,
            Err(e) => {
                warn!(error = %e, "could not fetch open positions, reconciliation skipped");
                return Vec::new();
            }
        };

        // no state lock is held across broker calls
        let gone = self.state.write().positions.sync(&reported);
        let closed: Vec<ClosedTrade> = gone
            .into_iter()
            .map(|position| finalize(position, self.ports.broker.as_ref(), now))
            .collect();
        {
            let mut state = self.state.write();
            for trade in &closed {
                state.session.record_close(trade);
            }
        }

        if let Some(journal) = &self.ports.journal {
            for trade in &closed {
                if let Err(e) = journal.record_close(trade) {
                    warn!(symbol = %trade.symbol, error = %e, "failed to journal closed trade");
                }
            }
        }
        closed
    }

    fn trail_stops(&self) -> Vec<TrailingUpdate> {
        let symbols = self.state.read().positions.symbols();
        if symbols.is_empty() {
            return Vec::new();
        }
        let atrs: HashMap<String, f64> = symbols
            .into_iter()
            .filter_map(|s| self.engine.trailing_atr(&s).map(|atr| (s, atr)))
            .collect();

        let moves = self.state.read().positions.trailing_candidates(
            |symbol| atrs.get(symbol).copied(),
            self.config.trailing.atr_multiplier,
        );
        if moves.is_empty() {
            return Vec::new();
        }
        let accepted = submit_stop_moves(moves, self.ports.broker.as_ref());

        let mut state = self.state.write();
        accepted
            .iter()
            .filter_map(|m| state.positions.confirm_stop_move(m))
            .collect()
    }

    fn process_symbol(&self, symbol: &str, now: DateTime<Utc>) -> SymbolReport {
        let evaluation = self.engine.evaluate(symbol, now);
        let decision = evaluation.decision.clone();

        if let Some(journal) = &self.ports.journal {
            if let Err(e) = journal.record_decision(&decision) {
                warn!(symbol = %symbol, error = %e, "failed to journal decision");
            }
        }

        let early_exit = {
            let mut state = self.state.write();
            state.last_decisions.insert(
                symbol.to_string(),
                DecisionSummary {
                    signal: decision.signal,
                    confidence: decision.confidence,
                    at: now,
                },
            );
            state
                .positions
                .early_exit_flag(&decision, self.config.engine.early_exit_confidence)
        };
        if early_exit {
            warn!(
                symbol = %symbol,
                signal = %decision.signal,
                confidence = decision.confidence,
                "early exit condition: signal opposes open position"
            );
        }

        let outcome = self.try_open(symbol, &evaluation, now);
        match &outcome {
            SymbolOutcome::Hold => debug!(symbol = %symbol, "hold"),
            SymbolOutcome::Rejected(reason) => {
                info!(
                    symbol = %symbol,
                    signal = %decision.signal,
                    reason = %reason,
                    "trade rejected"
                )
            }
            SymbolOutcome::ExecutionFailed(reason) => {
                error!(symbol = %symbol, reason = %reason, "order submission failed")
            }
            SymbolOutcome::Opened { ticket, lots } => {
                info!(symbol = %symbol, ticket, lots, "position opened")
            }
        }

        SymbolReport {
            symbol: symbol.to_string(),
            decision,
            outcome,
            early_exit,
        }
    }

    fn try_open(&self, symbol: &str, evaluation: &Evaluation, now: DateTime<Utc>) -> SymbolOutcome {
        let decision = &evaluation.decision;
        if decision.signal == Signal::Hold {
            return SymbolOutcome::Hold;
        }

        let direction = {
            let state = self.state.read();
            check_entry_gates(
                decision,
                self.config.engine.min_confidence,
                self.config.engine.max_daily_trades,
                &state.session,
                &state.positions,
            )
        };
        let direction = match direction {
            Ok(direction) => direction,
            Err(reason) => return SymbolOutcome::Rejected(reason),
        };

        match self.propose(symbol, direction, evaluation) {
            Ok(proposal) => self.submit(proposal, now),
            Err(reason) => SymbolOutcome::Rejected(reason),
        }
    }

    fn propose(
        &self,
        symbol: &str,
        direction: Direction,
        evaluation: &Evaluation,
    ) -> Result<Proposal, RejectReason> {
        let levels = evaluation
            .levels
            .filter(|l| l.is_actionable())
            .ok_or(RejectReason::ZeroStopDistance)?;

        let account = self
            .ports
            .broker
            .account()
            .map_err(|e| RejectReason::AccountUnavailable {
                reason: e.to_string(),
            })?;
        let constraints = self
            .ports
            .broker
            .symbol_constraints(symbol)
            .map_err(|e| RejectReason::InvalidConstraints {
                reason: e.to_string(),
            })?;
        let performance = self.recent_performance();

        let size = self.sizer.size(
            &evaluation.decision,
            &levels,
            &account,
            &constraints,
            performance.as_ref(),
        )?;

        Ok(Proposal {
            symbol: symbol.to_string(),
            direction,
            levels,
            lots: size.lots,
            constraints,
            decision: evaluation.decision.clone(),
        })
    }

    fn recent_performance(&self) -> Option<PerformanceStats> {
        let port = self.ports.performance.as_ref()?;
        match port.recent_stats(self.config.risk.performance_window_days) {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "performance history unavailable, risk not adjusted");
                None
            }
        }
    }

    fn submit(&self, proposal: Proposal, now: DateTime<Utc>) -> SymbolOutcome {
        let order = OrderRequest {
            symbol: proposal.symbol.clone(),
            direction: proposal.direction,
            size: proposal.lots,
            entry: proposal.levels.entry,
            stop_loss: proposal.levels.stop_loss,
            take_profit: proposal.levels.take_profit,
        };
        let fill = match self.ports.execution.submit(&order) {
            Ok(fill) => fill,
            Err(e) => return SymbolOutcome::ExecutionFailed(e.to_string()),
        };

        let lots = proposal.lots;
        let position = Position::open(proposal, fill.ticket, fill.filled_price, now);
        {
            let mut state = self.state.write();
            if let Err(reason) = state.positions.track(position.clone()) {
                return SymbolOutcome::Rejected(reason);
            }
            state.session.record_open();
        }

        if let Some(journal) = &self.ports.journal {
            if let Err(e) = journal.record_open(&position) {
                warn!(symbol = %position.symbol, error = %e, "failed to journal opened position");
            }
        }
        SymbolOutcome::Opened {
            ticket: fill.ticket,
            lots,
        }
    }

    pub fn log_session_summary(&self) {
        let state = self.state.read();
        let totals = state.session.totals();
        info!(
            trades_opened = totals.trades_opened,
            trades_closed = totals.trades_closed,
            win_rate = totals.win_rate().unwrap_or(0.0),
            realized_pnl = totals.realized_pnl,
            audited_closures = totals.audited_closures,
            still_open = state.positions.len(),
            "session summary"
        );
    }
}
