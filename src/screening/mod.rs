//! Pre-session universe screening

mod screener;

pub use screener::{Candidate, DailyBar, RejectReason, StockInfo, UniverseScreener, Verdict};
