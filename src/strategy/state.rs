//! Per-symbol, per-day derived state

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::common::types::Bar;
use crate::indicator::{IntradayMacd, MacdPoint, OscillatorState};

/// Composite key for day-scoped state
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayKey {
    pub symbol: String,
    pub day: NaiveDate,
}

impl DayKey {
    pub fn new(symbol: impl Into<String>, day: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            day,
        }
    }
}

/// Everything derived from the bars a symbol has received today
///
/// Created on the first bar of a new (symbol, day); every field is
/// consistent with exactly the bars applied since creation.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolDayState {
    pub(crate) key: DayKey,
    /// Shares per reported volume unit
    volume_unit: Decimal,
    /// The day's opening price (first bar's open)
    pub(crate) open: Option<Decimal>,
    pub(crate) closes: Vec<Decimal>,
    pub(crate) points: Vec<MacdPoint>,
    pub(crate) histogram: Vec<Decimal>,
    pub(crate) oscillator: Option<OscillatorState>,
    pub(crate) running_high: Option<Decimal>,
    pub(crate) cum_amount: Decimal,
    pub(crate) cum_volume: Decimal,
    /// Limit-up price, fetched once per day
    pub(crate) ceiling_price: Option<Decimal>,
    pub(crate) buy_count: u32,
    pub(crate) buy_prices: Vec<Decimal>,
    /// Oscillator-exhaustion exits taken today
    pub(crate) sell_count: u32,
    /// The opening-candle exit check has run
    pub(crate) opening_checked: bool,
}

impl SymbolDayState {
    pub fn new(key: DayKey, volume_unit: Decimal) -> Self {
        Self {
            key,
            volume_unit,
            open: None,
            closes: Vec::new(),
            points: Vec::new(),
            histogram: Vec::new(),
            oscillator: None,
            running_high: None,
            cum_amount: Decimal::ZERO,
            cum_volume: Decimal::ZERO,
            ceiling_price: None,
            buy_count: 0,
            buy_prices: Vec::new(),
            sell_count: 0,
            opening_checked: false,
        }
    }

    /// Fold one bar into every derived field
    pub fn apply_bar(&mut self, bar: &Bar, macd: &IntradayMacd) -> MacdPoint {
        let open = *self.open.get_or_insert(bar.open);

        self.closes.push(bar.close);
        self.running_high = Some(match self.running_high {
            Some(high) => high.max(bar.high),
            None => bar.high,
        });
        self.cum_amount += bar.amount;
        self.cum_volume += bar.volume;

        let point = macd.next(&mut self.oscillator, open, bar.close);
        self.points.push(point);
        self.histogram.push(point.histogram);
        point
    }

    /// Clear every field, keeping the key
    pub fn reset(&mut self) {
        *self = Self::new(self.key.clone(), self.volume_unit);
    }

    pub fn key(&self) -> &DayKey {
        &self.key
    }

    pub fn bar_count(&self) -> usize {
        self.closes.len()
    }

    pub fn last_close(&self) -> Option<Decimal> {
        self.closes.last().copied()
    }

    /// Close of the bar before the latest one
    pub fn previous_close(&self) -> Option<Decimal> {
        match self.closes.as_slice() {
            [.., previous, _] => Some(*previous),
            _ => None,
        }
    }

    pub fn running_high(&self) -> Option<Decimal> {
        self.running_high
    }

    /// Session VWAP: cumulative turnover over cumulative shares
    pub fn vwap(&self) -> Option<Decimal> {
        let shares = self.cum_volume * self.volume_unit;
        if shares.is_zero() {
            None
        } else {
            Some(self.cum_amount / shares)
        }
    }

    pub fn histogram(&self) -> &[Decimal] {
        &self.histogram
    }

    pub fn points(&self) -> &[MacdPoint] {
        &self.points
    }

    pub fn ceiling_price(&self) -> Option<Decimal> {
        self.ceiling_price
    }

    pub fn set_ceiling_price(&mut self, price: Decimal) {
        self.ceiling_price = Some(price);
    }

    pub fn buy_count(&self) -> u32 {
        self.buy_count
    }

    pub fn buy_prices(&self) -> &[Decimal] {
        &self.buy_prices
    }

    pub fn sell_count(&self) -> u32 {
        self.sell_count
    }

    pub(crate) fn record_buy(&mut self, price: Decimal) {
        self.buy_count += 1;
        self.buy_prices.push(price);
    }

    pub(crate) fn record_sell(&mut self) {
        self.sell_count += 1;
    }
}
