#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use fusetrader::domain::account::{AccountSnapshot, BrokerPosition, ClosedDeal, SymbolConstraints};
use fusetrader::domain::classifier::Model;
use fusetrader::domain::config::{
    AppConfig, EngineConfig, LevelConfig, RiskConfig, TimeframeConfig, TrailingConfig,
};
use fusetrader::domain::error::FusetraderError;
use fusetrader::domain::features::Feature;
use fusetrader::domain::fusion::Decision;
use fusetrader::domain::ohlcv::{Bar, Series, Timeframe};
use fusetrader::domain::position::{ClosedTrade, Position};
use fusetrader::domain::scheduler::SchedulerPorts;
use fusetrader::ports::broker_port::{BrokerPort, ExecutionPort, Fill, OrderRequest};
use fusetrader::ports::market_data_port::MarketDataPort;
use fusetrader::ports::model_port::ModelStore;
use fusetrader::ports::performance_port::TradeJournal;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Geometric series starting at 2000 on every timeframe. `growth` of 0 gives
/// a flat market.
pub struct SyntheticMarket {
    pub growth: f64,
    pub failing: bool,
}

impl SyntheticMarket {
    pub fn flat() -> Self {
        Self {
            growth: 0.0,
            failing: false,
        }
    }

    pub fn uptrend() -> Self {
        Self {
            growth: 0.001,
            failing: false,
        }
    }
}

impl MarketDataPort for SyntheticMarket {
    fn get_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        bars: usize,
    ) -> Result<Series, FusetraderError> {
        if self.failing {
            return Err(FusetraderError::Broker {
                reason: "feed down".into(),
            });
        }
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let step = timeframe.duration();
        let mut close = 2000.0;
        let rows = (0..bars)
            .map(|i| {
                let open = close;
                close *= 1.0 + self.growth;
                Bar {
                    timestamp: start + step * i as i32,
                    open,
                    high: open.max(close) + 0.5,
                    low: open.min(close) - 0.5,
                    close,
                    volume: Some(1000.0),
                }
            })
            .collect();
        Series::new(symbol, timeframe, rows)
    }
}

pub fn gold_constraints() -> SymbolConstraints {
    SymbolConstraints {
        min_lot: 0.01,
        max_lot: 100.0,
        lot_step: 0.01,
        point_value: 1.0,
        tick_size: 0.01,
    }
}

#[derive(Default)]
struct BrokerState {
    open: Vec<BrokerPosition>,
    deals: HashMap<u64, ClosedDeal>,
    submitted: Vec<OrderRequest>,
    stop_changes: Vec<(u64, f64)>,
    next_ticket: u64,
}

/// Broker and execution venue in one. Filled orders show up in
/// `open_positions` until [`MockBroker::close`] removes them.
pub struct MockBroker {
    pub account: Mutex<Result<AccountSnapshot, String>>,
    pub constraints: SymbolConstraints,
    pub reject_orders: Mutex<Option<String>>,
    state: Mutex<BrokerState>,
}

impl MockBroker {
    pub fn new(balance: f64) -> Self {
        Self {
            account: Mutex::new(Ok(AccountSnapshot {
                balance,
                free_margin: balance,
            })),
            constraints: gold_constraints(),
            reject_orders: Mutex::new(None),
            state: Mutex::new(BrokerState {
                next_ticket: 1000,
                ..BrokerState::default()
            }),
        }
    }

    pub fn rejecting(self, reason: &str) -> Self {
        *self.reject_orders.lock() = Some(reason.to_string());
        self
    }

    /// Drops the position from the open list, optionally leaving a deal record.
    pub fn close(&self, ticket: u64, deal: Option<(f64, f64)>) {
        let mut state = self.state.lock();
        state.open.retain(|p| p.ticket != ticket);
        if let Some((exit_price, profit)) = deal {
            state.deals.insert(
                ticket,
                ClosedDeal {
                    ticket,
                    exit_price,
                    profit,
                    closed_at: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
                },
            );
        }
    }

    pub fn set_price(&self, ticket: u64, price: f64) {
        let mut state = self.state.lock();
        if let Some(position) = state.open.iter_mut().find(|p| p.ticket == ticket) {
            position.current_price = price;
        }
    }

    pub fn submitted(&self) -> Vec<OrderRequest> {
        self.state.lock().submitted.clone()
    }

    pub fn stop_changes(&self) -> Vec<(u64, f64)> {
        self.state.lock().stop_changes.clone()
    }

    pub fn open_tickets(&self) -> Vec<u64> {
        self.state.lock().open.iter().map(|p| p.ticket).collect()
    }
}

impl BrokerPort for MockBroker {
    fn account(&self) -> Result<AccountSnapshot, FusetraderError> {
        self.account
            .lock()
            .clone()
            .map_err(|reason| FusetraderError::Broker { reason })
    }

    fn symbol_constraints(&self, _symbol: &str) -> Result<SymbolConstraints, FusetraderError> {
        Ok(self.constraints)
    }

    fn open_positions(&self) -> Result<Vec<BrokerPosition>, FusetraderError> {
        Ok(self.state.lock().open.clone())
    }

    fn modify_stop(&self, ticket: u64, new_stop: f64) -> Result<bool, FusetraderError> {
        let mut state = self.state.lock();
        let Some(position) = state.open.iter_mut().find(|p| p.ticket == ticket) else {
            return Ok(false);
        };
        position.stop_loss = new_stop;
        state.stop_changes.push((ticket, new_stop));
        Ok(true)
    }

    fn closed_deal(&self, ticket: u64) -> Result<Option<ClosedDeal>, FusetraderError> {
        Ok(self.state.lock().deals.get(&ticket).cloned())
    }
}

impl ExecutionPort for MockBroker {
    fn submit(&self, order: &OrderRequest) -> Result<Fill, FusetraderError> {
        if let Some(reason) = self.reject_orders.lock().clone() {
            return Err(FusetraderError::Execution {
                symbol: order.symbol.clone(),
                reason,
            });
        }
        let mut state = self.state.lock();
        state.next_ticket += 1;
        let ticket = state.next_ticket;
        state.submitted.push(order.clone());
        state.open.push(BrokerPosition {
            ticket,
            symbol: order.symbol.clone(),
            direction: order.direction,
            entry_price: order.entry,
            current_price: order.entry,
            stop_loss: order.stop_loss,
            take_profit: order.take_profit,
        });
        Ok(Fill {
            ticket,
            filled_price: order.entry,
        })
    }
}

/// Always answers with the same class probabilities.
pub struct FixedModel(pub [f64; 3]);

impl Model for FixedModel {
    fn features(&self) -> &[Feature] {
        &[Feature::Rsi14]
    }

    fn predict_proba(&self, _inputs: &[f64]) -> Result<[f64; 3], FusetraderError> {
        Ok(self.0)
    }
}

pub struct FixedStore {
    pub probabilities: Option<[f64; 3]>,
}

impl ModelStore for FixedStore {
    fn load_model(&self) -> Result<Option<Box<dyn Model>>, FusetraderError> {
        Ok(self
            .probabilities
            .map(|p| Box::new(FixedModel(p)) as Box<dyn Model>))
    }
}

pub fn bullish_store() -> Arc<dyn ModelStore> {
    Arc::new(FixedStore {
        probabilities: Some([0.05, 0.05, 0.9]),
    })
}

#[derive(Default)]
pub struct RecordingJournal {
    pub decisions: Mutex<Vec<Decision>>,
    pub opened: Mutex<Vec<Position>>,
    pub closed: Mutex<Vec<ClosedTrade>>,
}

impl TradeJournal for RecordingJournal {
    fn record_decision(&self, decision: &Decision) -> Result<(), FusetraderError> {
        self.decisions.lock().push(decision.clone());
        Ok(())
    }

    fn record_open(&self, position: &Position) -> Result<(), FusetraderError> {
        self.opened.lock().push(position.clone());
        Ok(())
    }

    fn record_close(&self, trade: &ClosedTrade) -> Result<(), FusetraderError> {
        self.closed.lock().push(trade.clone());
        Ok(())
    }
}

pub fn app_config(symbols: &[&str]) -> AppConfig {
    AppConfig {
        engine: EngineConfig::for_symbols(symbols),
        risk: RiskConfig::default(),
        levels: LevelConfig {
            default_multiplier: 2.0,
            multipliers: HashMap::new(),
        },
        timeframes: TimeframeConfig::default(),
        trailing: TrailingConfig::default(),
        model_path: None,
    }
}

pub fn ports(market: SyntheticMarket, broker: Arc<MockBroker>) -> SchedulerPorts {
    SchedulerPorts {
        market: Arc::new(market),
        broker: broker.clone(),
        execution: broker,
        performance: None,
        journal: None,
        model_store: Some(bullish_store()),
    }
}

/// Monday 2024-01-15 10:00 UTC.
pub fn monday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
}
