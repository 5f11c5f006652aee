//! Trade signals and position directions.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    /// SELL = -1, HOLD = 0, BUY = 1.
    pub fn unit_value(&self) -> f64 {
        match self {
            Signal::Buy => 1.0,
            Signal::Sell => -1.0,
            Signal::Hold => 0.0,
        }
    }

    /// Classifier class index: SELL = 0, HOLD = 1, BUY = 2.
    pub fn class_index(&self) -> usize {
        match self {
            Signal::Sell => 0,
            Signal::Hold => 1,
            Signal::Buy => 2,
        }
    }

    pub fn from_class_index(index: usize) -> Option<Signal> {
        match index {
            0 => Some(Signal::Sell),
            1 => Some(Signal::Hold),
            2 => Some(Signal::Buy),
            _ => None,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Signal::Buy => Some(Direction::Buy),
            Signal::Sell => Some(Direction::Sell),
            Signal::Hold => None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        })
    }
}

/// Side of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// +1 for BUY, -1 for SELL.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }

    pub fn as_signal(&self) -> Signal {
        match self {
            Direction::Buy => Signal::Buy,
            Direction::Sell => Signal::Sell,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_signal().fmt(f)
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" | "LONG" => Ok(Direction::Buy),
            "SELL" | "SHORT" => Ok(Direction::Sell),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}
