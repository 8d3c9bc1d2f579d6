//! Trading-day tracking and trading-hours checks

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use tracing::info;

use crate::config::{SessionConfig, SessionWindow};

/// Width of the window, from the open, in which a bar counts as the opening candle
const OPENING_WINDOW_MINUTES: i64 = 2;

/// Owns the current trading day
///
/// The clock is the only writer of the day value; every day-scoped piece of
/// engine state is reset when it reports a rollover.
#[derive(Debug, Clone)]
pub struct SessionClock {
    current_day: Option<NaiveDate>,
    open_time: NaiveTime,
}

impl SessionClock {
    pub fn new(open_time: NaiveTime) -> Self {
        Self {
            current_day: None,
            open_time,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.open_time)
    }

    pub fn current_day(&self) -> Option<NaiveDate> {
        self.current_day
    }

    /// Note an event time. Returns the new day when it differs from the
    /// current one (including the very first observation).
    pub fn observe(&mut self, timestamp: NaiveDateTime) -> Option<NaiveDate> {
        let day = timestamp.date();
        self.advance_to(day).then_some(day)
    }

    /// Move to `day` explicitly. Returns false if it is already current.
    pub fn advance_to(&mut self, day: NaiveDate) -> bool {
        if self.current_day == Some(day) {
            return false;
        }
        info!(previous = ?self.current_day, %day, "trading day rollover");
        self.current_day = Some(day);
        true
    }

    /// The bar stamped at this time is the first candle of continuous trading
    pub fn is_opening_bar(&self, timestamp: NaiveDateTime) -> bool {
        let time = timestamp.time();
        let end = self.open_time + Duration::minutes(OPENING_WINDOW_MINUTES);
        self.open_time <= time && time < end
    }
}

/// Weekday trading sessions
#[derive(Debug, Clone)]
pub struct TradingHours {
    sessions: Vec<SessionWindow>,
}

impl TradingHours {
    pub fn new(sessions: Vec<SessionWindow>) -> Self {
        Self { sessions }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.sessions.clone())
    }

    pub fn is_trading_day(&self, day: NaiveDate) -> bool {
        !matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
    }

    pub fn is_trading_time(&self, timestamp: NaiveDateTime) -> bool {
        self.is_trading_day(timestamp.date()) && self.sessions.iter().any(|s| s.contains(timestamp.time()))
    }
}

impl Default for TradingHours {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}
