//! Account and broker-side views consumed by the risk and lifecycle logic.

use chrono::{DateTime, Utc};

use crate::domain::signal::Direction;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountSnapshot {
    pub balance: f64,
    pub free_margin: f64,
}

/// Broker trading constraints for one symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolConstraints {
    pub min_lot: f64,
    pub max_lot: f64,
    pub lot_step: f64,
    /// Monetary value of one price step for one lot.
    pub point_value: f64,
    /// Smallest price increment.
    pub tick_size: f64,
}

impl SymbolConstraints {
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("min_lot", self.min_lot),
            ("max_lot", self.max_lot),
            ("lot_step", self.lot_step),
            ("point_value", self.point_value),
            ("tick_size", self.tick_size),
        ];
        if let Some((name, value)) = positive
            .iter()
            .find(|(_, v)| !(v.is_finite() && *v > 0.0))
        {
            return Err(format!("{name} must be positive, got {value}"));
        }
        if self.min_lot > self.max_lot {
            return Err(format!(
                "min_lot {} exceeds max_lot {}",
                self.min_lot, self.max_lot
            ));
        }
        Ok(())
    }
}

/// An open position as the broker reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerPosition {
    pub ticket: u64,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub current_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Exit record of a position the broker has closed.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedDeal {
    pub ticket: u64,
    pub exit_price: f64,
    pub profit: f64,
    pub closed_at: DateTime<Utc>,
}
