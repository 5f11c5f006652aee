//! Performance history and trade journal port traits.

use crate::domain::error::FusetraderError;
use crate::domain::fusion::Decision;
use crate::domain::position::{ClosedTrade, Position};
use crate::domain::risk::PerformanceStats;

pub trait PerformancePort: Send + Sync {
    /// Trade statistics over the trailing `days`; `None` if there is no history.
    fn recent_stats(&self, days: u32) -> Result<Option<PerformanceStats>, FusetraderError>;
}

/// Durable storage hand-off for runtime records.
pub trait TradeJournal: Send + Sync {
    fn record_decision(&self, decision: &Decision) -> Result<(), FusetraderError>;
    fn record_open(&self, position: &Position) -> Result<(), FusetraderError>;
    fn record_close(&self, trade: &ClosedTrade) -> Result<(), FusetraderError>;
}
