//! Trading calendar

mod clock;

pub use clock::{SessionClock, TradingHours};
