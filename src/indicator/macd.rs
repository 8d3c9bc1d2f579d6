//! Intraday MACD seeded at the session open
//!
//! Unlike the textbook MACD, both exponential averages start from the day's
//! opening price and the signal line starts from zero, so the oscillator is
//! meaningful from the first minute of trading instead of after `slow_period`
//! samples. State never crosses a trading-day boundary.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::IndicatorConfig;

/// Smoothing factor `2 / (period + 1)`
pub fn smoothing(period: u32) -> Decimal {
    dec!(2) / Decimal::from(period as u64 + 1)
}

/// One exponential-average step
#[inline]
pub fn ema_step(previous: Decimal, value: Decimal, alpha: Decimal) -> Decimal {
    value * alpha + previous * (Decimal::ONE - alpha)
}

/// The three recursive averages carried between bars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OscillatorState {
    pub fast: Decimal,
    pub slow: Decimal,
    pub signal: Decimal,
}

impl OscillatorState {
    /// Seed from the day's opening price
    pub fn seeded(open: Decimal) -> Self {
        Self {
            fast: open,
            slow: open,
            signal: Decimal::ZERO,
        }
    }

    fn point(&self) -> MacdPoint {
        let dif = self.fast - self.slow;
        MacdPoint {
            fast: self.fast,
            slow: self.slow,
            dif,
            dea: self.signal,
            histogram: dec!(2) * (dif - self.signal),
        }
    }
}

/// Indicator output for one bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdPoint {
    pub fast: Decimal,
    pub slow: Decimal,
    /// Oscillator line, fast - slow
    pub dif: Decimal,
    /// Signal line, EMA of DIF
    pub dea: Decimal,
    /// 2 * (DIF - DEA)
    pub histogram: Decimal,
}

/// Online calculator for the session-seeded MACD
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntradayMacd {
    fast_alpha: Decimal,
    slow_alpha: Decimal,
    signal_alpha: Decimal,
}

impl IntradayMacd {
    pub fn new(fast_period: u32, slow_period: u32, signal_period: u32) -> Self {
        Self {
            fast_alpha: smoothing(fast_period),
            slow_alpha: smoothing(slow_period),
            signal_alpha: smoothing(signal_period),
        }
    }

    pub fn from_config(config: &IndicatorConfig) -> Self {
        Self::new(config.fast_period, config.slow_period, config.signal_period)
    }

    /// Advance by one price.
    ///
    /// With no state yet (first bar of the day) the state is seeded from
    /// `open` and the seed itself is the output: fast = slow = open,
    /// DIF = DEA = histogram = 0. Every later call folds `price` into the
    /// three averages.
    pub fn next(&self, state: &mut Option<OscillatorState>, open: Decimal, price: Decimal) -> MacdPoint {
        match state {
            None => {
                let seeded = OscillatorState::seeded(open);
                *state = Some(seeded);
                seeded.point()
            }
            Some(current) => {
                current.fast = ema_step(current.fast, price, self.fast_alpha);
                current.slow = ema_step(current.slow, price, self.slow_alpha);
                let dif = current.fast - current.slow;
                current.signal = ema_step(current.signal, dif, self.signal_alpha);
                current.point()
            }
        }
    }

    /// Batch form over a whole day's closes; empty input yields no output
    pub fn compute(&self, prices: &[Decimal], open: Decimal) -> Vec<MacdPoint> {
        let mut state = None;
        prices
            .iter()
            .map(|&price| self.next(&mut state, open, price))
            .collect()
    }
}

impl Default for IntradayMacd {
    fn default() -> Self {
        Self::from_config(&IndicatorConfig::default())
    }
}
