//! In-memory paper broker.
//!
//! Fills every order at its requested entry, marks open positions to the
//! latest close of the configured timeframe, and closes a position at its
//! stop or target once the mark crosses it. Closed deals are remembered so
//! reconciliation can read exit prices back.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::domain::account::{AccountSnapshot, BrokerPosition, ClosedDeal, SymbolConstraints};
use crate::domain::error::FusetraderError;
use crate::domain::ohlcv::Timeframe;
use crate::domain::signal::Direction;
use crate::ports::broker_port::{BrokerPort, ExecutionPort, Fill, OrderRequest};
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;

pub const DEFAULT_BALANCE: f64 = 10_000.0;
pub const DEFAULT_LEVERAGE: f64 = 100.0;

#[derive(Debug, Clone)]
struct PaperPosition {
    report: BrokerPosition,
    size: f64,
    constraints: SymbolConstraints,
}

impl PaperPosition {
    fn pnl_at(&self, price: f64) -> f64 {
        let sign = self.report.direction.sign();
        sign * (price - self.report.entry_price) / self.constraints.tick_size
            * self.constraints.point_value
            * self.size
    }

    fn margin(&self, leverage: f64) -> f64 {
        self.report.current_price / self.constraints.tick_size
            * self.constraints.point_value
            * self.size
            / leverage
    }

    /// Exit level crossed by `price`, stop first.
    fn exit_level(&self, price: f64) -> Option<f64> {
        let r = &self.report;
        let (stop_hit, target_hit) = match r.direction {
            Direction::Buy => (
                r.stop_loss > 0.0 && price <= r.stop_loss,
                r.take_profit > 0.0 && price >= r.take_profit,
            ),
            Direction::Sell => (
                r.stop_loss > 0.0 && price >= r.stop_loss,
                r.take_profit > 0.0 && price <= r.take_profit,
            ),
        };
        if stop_hit {
            Some(r.stop_loss)
        } else if target_hit {
            Some(r.take_profit)
        } else {
            None
        }
    }
}

#[derive(Debug)]
struct PaperState {
    balance: f64,
    next_ticket: u64,
    open: BTreeMap<u64, PaperPosition>,
    closed: HashMap<u64, ClosedDeal>,
}

pub struct PaperBroker {
    market: Arc<dyn MarketDataPort>,
    mark_timeframe: Timeframe,
    leverage: f64,
    constraints: HashMap<String, SymbolConstraints>,
    default_constraints: SymbolConstraints,
    state: Mutex<PaperState>,
}

impl PaperBroker {
    pub fn new(market: Arc<dyn MarketDataPort>, mark_timeframe: Timeframe, balance: f64) -> Self {
        let table = [
            ("XAUUSD", lot_constraints(0.01, 1.0)),
            ("EURUSD", lot_constraints(0.00001, 1.0)),
            ("GBPUSD", lot_constraints(0.00001, 1.0)),
            ("BTCUSD", lot_constraints(0.01, 0.01)),
        ]
        .into_iter()
        .map(|(s, c)| (s.to_string(), c))
        .collect();

        Self {
            market,
            mark_timeframe,
            leverage: DEFAULT_LEVERAGE,
            constraints: table,
            default_constraints: lot_constraints(0.00001, 1.0),
            state: Mutex::new(PaperState {
                balance,
                next_ticket: 1,
                open: BTreeMap::new(),
                closed: HashMap::new(),
            }),
        }
    }

    /// Reads `[paper] balance` and `leverage`.
    pub fn from_config(
        config: &dyn ConfigPort,
        market: Arc<dyn MarketDataPort>,
        mark_timeframe: Timeframe,
    ) -> Result<Self, FusetraderError> {
        let balance = config.get_double("paper", "balance", DEFAULT_BALANCE);
        let leverage = config.get_double("paper", "leverage", DEFAULT_LEVERAGE);
        for (key, value) in [("balance", balance), ("leverage", leverage)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(FusetraderError::ConfigInvalid {
                    section: "paper".into(),
                    key: key.into(),
                    reason: format!("must be positive, got {}", value),
                });
            }
        }
        Ok(Self::new(market, mark_timeframe, balance).with_leverage(leverage))
    }

    pub fn with_leverage(mut self, leverage: f64) -> Self {
        self.leverage = leverage;
        self
    }

    pub fn with_constraints(mut self, symbol: &str, constraints: SymbolConstraints) -> Self {
        self.constraints.insert(symbol.to_string(), constraints);
        self
    }

    pub fn balance(&self) -> f64 {
        self.state.lock().balance
    }

    fn constraints_for(&self, symbol: &str) -> SymbolConstraints {
        self.constraints
            .get(symbol)
            .copied()
            .unwrap_or(self.default_constraints)
    }

    fn latest(&self, symbol: &str) -> Option<(f64, DateTime<Utc>)> {
        let series = self.market.get_series(symbol, self.mark_timeframe, 1).ok()?;
        series.last().map(|bar| (bar.close, bar.timestamp))
    }

    /// Marks every open position and closes those whose stop or target was crossed.
    fn mark_to_market(&self, state: &mut PaperState) {
        let tickets: Vec<u64> = state.open.keys().copied().collect();
        for ticket in tickets {
            let Some(symbol) = state.open.get(&ticket).map(|p| p.report.symbol.clone()) else {
                continue;
            };
            let Some((price, at)) = self.latest(&symbol) else {
                continue;
            };
            let exit = match state.open.get_mut(&ticket) {
                Some(position) => {
                    position.report.current_price = price;
                    position.exit_level(price)
                }
                None => None,
            };
            let Some(exit_price) = exit else {
                continue;
            };
            let Some(position) = state.open.remove(&ticket) else {
                continue;
            };
            let profit = position.pnl_at(exit_price);
            state.balance += profit;
            info!(symbol = %symbol, ticket, exit_price, profit, "paper position closed");
            state.closed.insert(
                ticket,
                ClosedDeal {
                    ticket,
                    exit_price,
                    profit,
                    closed_at: at,
                },
            );
        }
    }
}

fn lot_constraints(tick_size: f64, point_value: f64) -> SymbolConstraints {
    SymbolConstraints {
        min_lot: 0.01,
        max_lot: 100.0,
        lot_step: 0.01,
        point_value,
        tick_size,
    }
}

impl BrokerPort for PaperBroker {
    fn account(&self) -> Result<AccountSnapshot, FusetraderError> {
        let state = self.state.lock();
        let unrealized: f64 = state
            .open
            .values()
            .map(|p| p.pnl_at(p.report.current_price))
            .sum();
        let used_margin: f64 = state.open.values().map(|p| p.margin(self.leverage)).sum();
        Ok(AccountSnapshot {
            balance: state.balance,
            free_margin: state.balance + unrealized - used_margin,
        })
    }

    fn symbol_constraints(&self, symbol: &str) -> Result<SymbolConstraints, FusetraderError> {
        Ok(self.constraints_for(symbol))
    }

    fn open_positions(&self) -> Result<Vec<BrokerPosition>, FusetraderError> {
        let mut state = self.state.lock();
        self.mark_to_market(&mut state);
        Ok(state.open.values().map(|p| p.report.clone()).collect())
    }

    fn modify_stop(&self, ticket: u64, new_stop: f64) -> Result<bool, FusetraderError> {
        let mut state = self.state.lock();
        match state.open.get_mut(&ticket) {
            Some(position) if new_stop.is_finite() && new_stop > 0.0 => {
                debug!(ticket, new_stop, "paper stop modified");
                position.report.stop_loss = new_stop;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn closed_deal(&self, ticket: u64) -> Result<Option<ClosedDeal>, FusetraderError> {
        Ok(self.state.lock().closed.get(&ticket).cloned())
    }
}

impl ExecutionPort for PaperBroker {
    fn submit(&self, order: &OrderRequest) -> Result<Fill, FusetraderError> {
        let rejected = |reason: String| FusetraderError::Execution {
            symbol: order.symbol.clone(),
            reason,
        };
        if !(order.size > 0.0) || !(order.entry > 0.0) {
            return Err(rejected(format!(
                "invalid order size {} at {}",
                order.size, order.entry
            )));
        }

        let constraints = self.constraints_for(&order.symbol);
        let position = PaperPosition {
            report: BrokerPosition {
                ticket: 0,
                symbol: order.symbol.clone(),
                direction: order.direction,
                entry_price: order.entry,
                current_price: order.entry,
                stop_loss: order.stop_loss,
                take_profit: order.take_profit,
            },
            size: order.size,
            constraints,
        };

        let free_margin = self.account()?.free_margin;
        let required = position.margin(self.leverage);
        if required > free_margin {
            return Err(rejected(format!(
                "margin {:.2} exceeds free margin {:.2}",
                required, free_margin
            )));
        }

        let mut state = self.state.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        let mut position = position;
        position.report.ticket = ticket;
        state.open.insert(ticket, position);
        info!(
            symbol = %order.symbol,
            ticket,
            direction = %order.direction,
            size = order.size,
            entry = order.entry,
            "paper order filled"
        );
        Ok(Fill {
            ticket,
            filled_price: order.entry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::{Bar, Series};
    use chrono::TimeZone;

    /// Returns a single bar whose close can be moved by the test.
    struct MovablePrice {
        close: Mutex<f64>,
    }

    impl MarketDataPort for MovablePrice {
        fn get_series(
            &self,
            symbol: &str,
            timeframe: Timeframe,
            _bars: usize,
        ) -> Result<Series, FusetraderError> {
            let close = *self.close.lock();
            let bar = Bar {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: None,
            };
            Series::new(symbol, timeframe, vec![bar])
        }
    }

    fn broker(price: f64) -> (Arc<MovablePrice>, PaperBroker) {
        let market = Arc::new(MovablePrice {
            close: Mutex::new(price),
        });
        let broker = PaperBroker::new(market.clone(), Timeframe::M15, 10_000.0);
        (market, broker)
    }

    fn buy_order() -> OrderRequest {
        OrderRequest {
            symbol: "XAUUSD".to_string(),
            direction: Direction::Buy,
            size: 0.5,
            entry: 2000.0,
            stop_loss: 1990.0,
            take_profit: 2025.0,
        }
    }

    #[test]
    fn fills_at_requested_entry() {
        let (_market, broker) = broker(2000.0);
        let fill = broker.submit(&buy_order()).unwrap();
        assert_eq!(fill.ticket, 1);
        assert_eq!(fill.filled_price, 2000.0);

        let open = broker.open_positions().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].symbol, "XAUUSD");
        assert_eq!(open[0].current_price, 2000.0);
    }

    #[test]
    fn tickets_increase() {
        let (_market, broker) = broker(2000.0);
        let first = broker.submit(&buy_order()).unwrap();
        let second = broker.submit(&buy_order()).unwrap();
        assert!(second.ticket > first.ticket);
    }

    #[test]
    fn target_hit_closes_and_records_deal() {
        let (market, broker) = broker(2000.0);
        let fill = broker.submit(&buy_order()).unwrap();

        *market.close.lock() = 2030.0;
        assert!(broker.open_positions().unwrap().is_empty());

        let deal = broker.closed_deal(fill.ticket).unwrap().unwrap();
        assert_eq!(deal.exit_price, 2025.0);
        // 25.00 / 0.01 * 1.0 * 0.5
        assert!((deal.profit - 1250.0).abs() < 1e-9);
        assert!((broker.balance() - 11_250.0).abs() < 1e-9);
    }

    #[test]
    fn stop_hit_on_short() {
        let (market, broker) = broker(2000.0);
        let mut order = buy_order();
        order.direction = Direction::Sell;
        order.stop_loss = 2010.0;
        order.take_profit = 1975.0;
        let fill = broker.submit(&order).unwrap();

        *market.close.lock() = 2011.0;
        assert!(broker.open_positions().unwrap().is_empty());
        let deal = broker.closed_deal(fill.ticket).unwrap().unwrap();
        assert_eq!(deal.exit_price, 2010.0);
        assert!((deal.profit + 500.0).abs() < 1e-9);
    }

    #[test]
    fn modify_stop_only_for_open_tickets() {
        let (_market, broker) = broker(2000.0);
        let fill = broker.submit(&buy_order()).unwrap();
        assert!(broker.modify_stop(fill.ticket, 1995.0).unwrap());
        assert_eq!(broker.open_positions().unwrap()[0].stop_loss, 1995.0);
        assert!(!broker.modify_stop(999, 1995.0).unwrap());
    }

    #[test]
    fn account_reflects_unrealized_and_margin() {
        let (market, broker) = broker(2000.0);
        broker.submit(&buy_order()).unwrap();
        *market.close.lock() = 2004.0;
        broker.open_positions().unwrap();

        let account = broker.account().unwrap();
        assert_eq!(account.balance, 10_000.0);
        // unrealized 200; margin 2004 / 0.01 * 1.0 * 0.5 / 100 = 1002
        assert!((account.free_margin - (10_000.0 + 200.0 - 1002.0)).abs() < 1e-6);
    }

    #[test]
    fn rejects_order_beyond_margin() {
        let (_market, broker) = broker(2000.0);
        let mut order = buy_order();
        order.size = 100.0;
        let err = broker.submit(&order).unwrap_err();
        assert!(matches!(err, FusetraderError::Execution { .. }));
        assert!(broker.open_positions().unwrap().is_empty());
    }

    #[test]
    fn unknown_symbol_gets_default_constraints() {
        let (_market, broker) = broker(1.1);
        let c = broker.symbol_constraints("USDJPY").unwrap();
        assert!(c.validate().is_ok());
        assert_eq!(broker.symbol_constraints("XAUUSD").unwrap().tick_size, 0.01);
    }
}
