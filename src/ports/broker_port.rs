//! Broker state and trade execution port traits.

use crate::domain::account::{AccountSnapshot, BrokerPosition, ClosedDeal, SymbolConstraints};
use crate::domain::error::FusetraderError;
use crate::domain::signal::Direction;

pub trait BrokerPort: Send + Sync {
    fn account(&self) -> Result<AccountSnapshot, FusetraderError>;

    fn symbol_constraints(&self, symbol: &str) -> Result<SymbolConstraints, FusetraderError>;

    fn open_positions(&self) -> Result<Vec<BrokerPosition>, FusetraderError>;

    /// Returns `Ok(false)` when the broker declined the change.
    fn modify_stop(&self, ticket: u64, new_stop: f64) -> Result<bool, FusetraderError>;

    /// Exit details of a ticket the broker no longer reports as open.
    fn closed_deal(&self, _ticket: u64) -> Result<Option<ClosedDeal>, FusetraderError> {
        Ok(None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub direction: Direction,
    pub size: f64,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub ticket: u64,
    pub filled_price: f64,
}

pub trait ExecutionPort: Send + Sync {
    /// Submits a market order. A rejected order is an `Err`.
    fn submit(&self, order: &OrderRequest) -> Result<Fill, FusetraderError>;
}
