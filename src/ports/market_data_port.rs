//! Market data port trait.

use crate::domain::error::FusetraderError;
use crate::domain::ohlcv::{Series, Timeframe};

pub trait MarketDataPort: Send + Sync {
    /// The most recent `bars` bars, oldest first. An empty series means the
    /// data is unavailable right now; it is not an error.
    fn get_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        bars: usize,
    ) -> Result<Series, FusetraderError>;
}
