//! Process-wide session counters.

use chrono::{Datelike, NaiveDate, Weekday};

use crate::domain::position::ClosedTrade;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionTotals {
    pub trades_opened: u32,
    pub trades_closed: u32,
    pub winning_trades: u32,
    pub audited_closures: u32,
    pub realized_pnl: f64,
}

impl SessionTotals {
    /// Fraction of closed trades that were profitable, `None` before the first close.
    pub fn win_rate(&self) -> Option<f64> {
        if self.trades_closed == 0 {
            None
        } else {
            Some(self.winning_trades as f64 / self.trades_closed as f64)
        }
    }
}

/// Outcome of advancing the session clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayRollover {
    SameDay,
    NewDay { retrain: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    daily_trade_count: u32,
    last_reset_date: NaiveDate,
    totals: SessionTotals,
}

impl SessionState {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            daily_trade_count: 0,
            last_reset_date: today,
            totals: SessionTotals::default(),
        }
    }

    pub fn daily_trade_count(&self) -> u32 {
        self.daily_trade_count
    }

    pub fn last_reset_date(&self) -> NaiveDate {
        self.last_reset_date
    }

    pub fn totals(&self) -> &SessionTotals {
        &self.totals
    }

    pub fn daily_limit_reached(&self, cap: u32) -> bool {
        self.daily_trade_count >= cap
    }

    /// Resets the daily counter once `today` moves past the last reset date.
    /// A backwards clock is ignored.
    pub fn advance_to(&mut self, today: NaiveDate, retrain_day: Weekday) -> DayRollover {
        if today <= self.last_reset_date {
            return DayRollover::SameDay;
        }
        self.daily_trade_count = 0;
        self.last_reset_date = today;
        DayRollover::NewDay {
            retrain: today.weekday() == retrain_day,
        }
    }

    pub fn record_open(&mut self) {
        self.daily_trade_count += 1;
        self.totals.trades_opened += 1;
    }

    pub fn record_close(&mut self, trade: &ClosedTrade) {
        self.totals.trades_closed += 1;
        if trade.is_win() {
            self.totals.winning_trades += 1;
        }
        if trade.needs_audit {
            self.totals.audited_closures += 1;
        }
        self.totals.realized_pnl += trade.pnl;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::test_support::open_position;
    use crate::domain::signal::Direction;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn counts_opens_until_cap() {
        let mut session = SessionState::new(date(2024, 1, 15));
        assert!(!session.daily_limit_reached(2));
        session.record_open();
        session.record_open();
        assert!(session.daily_limit_reached(2));
        assert_eq!(session.totals().trades_opened, 2);
    }

    #[test]
    fn new_day_resets_daily_count_only() {
        let mut session = SessionState::new(date(2024, 1, 14));
        session.record_open();
        // 2024-01-15 is a Monday
        let rollover = session.advance_to(date(2024, 1, 15), Weekday::Mon);
        assert_eq!(rollover, DayRollover::NewDay { retrain: true });
        assert_eq!(session.daily_trade_count(), 0);
        assert_eq!(session.totals().trades_opened, 1);
        assert_eq!(session.last_reset_date(), date(2024, 1, 15));

        assert_eq!(session.advance_to(date(2024, 1, 15), Weekday::Mon), DayRollover::SameDay);
        assert_eq!(
            session.advance_to(date(2024, 1, 16), Weekday::Mon),
            DayRollover::NewDay { retrain: false }
        );
    }

    #[test]
    fn clock_going_backwards_is_ignored() {
        let mut session = SessionState::new(date(2024, 1, 15));
        session.record_open();
        assert_eq!(session.advance_to(date(2024, 1, 14), Weekday::Sun), DayRollover::SameDay);
        assert_eq!(session.daily_trade_count(), 1);
    }

    #[test]
    fn closes_update_totals() {
        let mut session = SessionState::new(date(2024, 1, 15));
        assert_eq!(session.totals().win_rate(), None);

        let pos = open_position(Direction::Buy, 2000.0, 1990.0, 2025.0);
        let exit = pos.entry_time;
        session.record_close(&pos.clone().close(2010.0, 500.0, exit, false));
        session.record_close(&pos.close(1990.0, -500.0, exit, true));

        let totals = session.totals();
        assert_eq!(totals.trades_closed, 2);
        assert_eq!(totals.winning_trades, 1);
        assert_eq!(totals.audited_closures, 1);
        assert_eq!(totals.win_rate(), Some(0.5));
        assert!(totals.realized_pnl.abs() < 1e-9);
    }
}
