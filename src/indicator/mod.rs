//! Intraday oscillator and histogram patterns

pub mod macd;
pub mod signal;

pub use macd::{IntradayMacd, MacdPoint, OscillatorState};
pub use signal::{classify, is_shrinking_negative, is_shrinking_positive, HistogramPattern};
