//! SQLite trade journal and performance history.
//!
//! Decisions, opened positions and closed trades are appended to three
//! tables; `recent_stats` answers from `closed_trades`. Timestamps are stored
//! as RFC 3339 UTC strings so they compare correctly as text.

use crate::domain::error::FusetraderError;
use crate::domain::fusion::Decision;
use crate::domain::position::{ClosedTrade, Position};
use crate::domain::risk::PerformanceStats;
use crate::ports::config_port::ConfigPort;
use crate::ports::performance_port::{PerformancePort, TradeJournal};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn query_error(e: rusqlite::Error) -> FusetraderError {
    FusetraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, FusetraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| FusetraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| FusetraderError::Database {
                    reason: e.to_string(),
                })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, FusetraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| FusetraderError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, FusetraderError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| FusetraderError::Database {
                reason: e.to_string(),
            })
    }

    pub fn initialize_schema(&self) -> Result<(), FusetraderError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS decisions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    symbol TEXT NOT NULL,
                    signal TEXT NOT NULL,
                    confidence REAL NOT NULL,
                    combined_score REAL NOT NULL,
                    fallback INTEGER NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS positions (
                    ticket INTEGER PRIMARY KEY,
                    symbol TEXT NOT NULL,
                    direction TEXT NOT NULL,
                    entry_price REAL NOT NULL,
                    stop_loss REAL NOT NULL,
                    take_profit REAL NOT NULL,
                    size REAL NOT NULL,
                    confidence REAL NOT NULL,
                    entry_time TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS closed_trades (
                    ticket INTEGER PRIMARY KEY,
                    symbol TEXT NOT NULL,
                    direction TEXT NOT NULL,
                    size REAL NOT NULL,
                    entry_price REAL NOT NULL,
                    exit_price REAL NOT NULL,
                    entry_time TEXT NOT NULL,
                    exit_time TEXT NOT NULL,
                    pnl REAL NOT NULL,
                    confidence REAL NOT NULL,
                    needs_audit INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_decisions_symbol ON decisions(symbol, created_at);
                CREATE INDEX IF NOT EXISTS idx_closed_exit_time ON closed_trades(exit_time);",
            )
            .map_err(query_error)
    }

    /// Statistics over trades that closed at or after `since`.
    pub fn stats_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Option<PerformanceStats>, FusetraderError> {
        let (count, wins): (i64, Option<i64>) = self
            .conn()?
            .query_row(
                "SELECT COUNT(*), SUM(CASE WHEN pnl > 0 THEN 1 ELSE 0 END)
                 FROM closed_trades WHERE exit_time >= ?1",
                params![timestamp(since)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(query_error)?;

        if count == 0 {
            return Ok(None);
        }
        Ok(Some(PerformanceStats {
            trade_count: count as u32,
            win_rate: wins.unwrap_or(0) as f64 / count as f64,
        }))
    }

    pub fn decision_count(&self, symbol: &str) -> Result<usize, FusetraderError> {
        let count: i64 = self
            .conn()?
            .query_row(
                "SELECT COUNT(*) FROM decisions WHERE symbol = ?1",
                params![symbol],
                |row| row.get(0),
            )
            .map_err(query_error)?;
        Ok(count as usize)
    }

    /// Closed trades whose exit price was estimated rather than reported.
    pub fn trades_needing_audit(&self) -> Result<Vec<u64>, FusetraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT ticket FROM closed_trades WHERE needs_audit = 1 ORDER BY ticket")
            .map_err(query_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .map_err(query_error)?;

        let mut tickets = Vec::new();
        for row in rows {
            tickets.push(row.map_err(query_error)? as u64);
        }
        Ok(tickets)
    }
}

impl TradeJournal for SqliteAdapter {
    fn record_decision(&self, decision: &Decision) -> Result<(), FusetraderError> {
        self.conn()?
            .execute(
                "INSERT INTO decisions (symbol, signal, confidence, combined_score, fallback, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    decision.symbol,
                    decision.signal.to_string(),
                    decision.confidence,
                    decision.combined_score,
                    decision.fallback,
                    timestamp(decision.created_at)
                ],
            )
            .map_err(query_error)?;
        Ok(())
    }

    fn record_open(&self, position: &Position) -> Result<(), FusetraderError> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO positions
                 (ticket, symbol, direction, entry_price, stop_loss, take_profit, size, confidence, entry_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    position.ticket as i64,
                    position.symbol,
                    position.direction.to_string(),
                    position.entry_price,
                    position.stop_loss,
                    position.take_profit,
                    position.size,
                    position.decision.confidence,
                    timestamp(position.entry_time)
                ],
            )
            .map_err(query_error)?;
        Ok(())
    }

    /// A ticket is stored once; a repeated close is ignored.
    fn record_close(&self, trade: &ClosedTrade) -> Result<(), FusetraderError> {
        self.conn()?
            .execute(
                "INSERT OR IGNORE INTO closed_trades
                 (ticket, symbol, direction, size, entry_price, exit_price, entry_time, exit_time,
                  pnl, confidence, needs_audit)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    trade.ticket as i64,
                    trade.symbol,
                    trade.direction.to_string(),
                    trade.size,
                    trade.entry_price,
                    trade.exit_price,
                    timestamp(trade.entry_time),
                    timestamp(trade.exit_time),
                    trade.pnl,
                    trade.confidence,
                    trade.needs_audit
                ],
            )
            .map_err(query_error)?;
        Ok(())
    }
}

impl PerformancePort for SqliteAdapter {
    fn recent_stats(&self, days: u32) -> Result<Option<PerformanceStats>, FusetraderError> {
        self.stats_since(Utc::now() - Duration::days(days as i64))
    }
}
