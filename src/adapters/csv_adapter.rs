//! CSV market data adapter.
//!
//! Reads `{SYMBOL}_{TIMEFRAME}.csv` (e.g. `XAUUSD_M15.csv`) from a base
//! directory. Columns: `timestamp,open,high,low,close[,volume]`. Timestamps
//! are RFC 3339 or `YYYY-MM-DD HH:MM:SS` in UTC. A missing file yields an
//! empty series.

use crate::domain::error::FusetraderError;
use crate::domain::ohlcv::{Bar, Series, Timeframe};
use crate::ports::market_data_port::MarketDataPort;
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::StringRecord;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, timeframe))
    }

    /// Symbols with a file for `timeframe`, sorted.
    pub fn list_symbols(&self, timeframe: Timeframe) -> Result<Vec<String>, FusetraderError> {
        let suffix = format!("_{}.csv", timeframe);
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(symbol) = name.strip_suffix(&suffix) {
                symbols.push(symbol.to_string());
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn parse_bar(record: &StringRecord, symbol: &str, line: usize) -> Result<Bar, FusetraderError> {
    let invalid = |reason: String| FusetraderError::InvalidSeries {
        symbol: symbol.to_string(),
        reason: format!("line {}: {}", line, reason),
    };
    let field = |index: usize, name: &str| -> Result<f64, FusetraderError> {
        record
            .get(index)
            .ok_or_else(|| invalid(format!("missing {} column", name)))?
            .trim()
            .parse()
            .map_err(|e| invalid(format!("invalid {} value: {}", name, e)))
    };

    let raw_ts = record
        .get(0)
        .ok_or_else(|| invalid("missing timestamp column".into()))?;
    let timestamp =
        parse_timestamp(raw_ts).ok_or_else(|| invalid(format!("invalid timestamp {:?}", raw_ts)))?;

    let volume = match record.get(5).map(str::trim) {
        None | Some("") => None,
        Some(v) => Some(
            v.parse()
                .map_err(|e| invalid(format!("invalid volume value: {}", e)))?,
        ),
    };

    Ok(Bar {
        timestamp,
        open: field(1, "open")?,
        high: field(2, "high")?,
        low: field(3, "low")?,
        close: field(4, "close")?,
        volume,
    })
}

impl MarketDataPort for CsvAdapter {
    fn get_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        bars: usize,
    ) -> Result<Series, FusetraderError> {
        let path = self.csv_path(symbol, timeframe);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Series::new(symbol, timeframe, Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(content.as_bytes());
        let mut rows = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| FusetraderError::InvalidSeries {
                symbol: symbol.to_string(),
                reason: format!("CSV parse error: {}", e),
            })?;
            // header is line 1
            rows.push(parse_bar(&record, symbol, i + 2)?);
        }

        rows.sort_by_key(|b| b.timestamp);
        let skip = rows.len().saturating_sub(bars);
        Series::new(symbol, timeframe, rows.split_off(skip))
    }
}
