//! Common test utilities and fixtures

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use pullback_trader::broker::{PaperBroker, PaperBrokerConfig};
use pullback_trader::common::channels::create_notification_channel;
use pullback_trader::{AppConfig, Bar, EngineEvent, OrderId, Trader};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

pub const SYMBOL: &str = "600000.SH";

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Minute `n` of continuous trading, starting at 09:31
pub fn minute(date: NaiveDate, n: usize) -> NaiveDateTime {
    let first = NaiveDateTime::new(date, NaiveTime::from_hms_opt(9, 31, 0).unwrap());
    first + Duration::minutes(n as i64)
}

/// Rally to +4%, pull back, then recover: the negative histogram shrinks
/// on bars 13 and 14, the positive one on bars 6, 7 and 8.
pub fn pullback_closes() -> Vec<Decimal> {
    vec![
        dec!(10.00),
        dec!(10.10),
        dec!(10.20),
        dec!(10.30),
        dec!(10.40),
        dec!(10.30),
        dec!(10.20),
        dec!(10.10),
        dec!(10.05),
        dec!(10.05),
        dec!(10.06),
        dec!(10.08),
        dec!(10.10),
        dec!(10.14),
        dec!(10.18),
        dec!(10.22),
    ]
}

/// One bar per close; each bar opens at the previous close and the first
/// bar carries heavy volume so VWAP stays near the open.
pub fn session_bars(date: NaiveDate, closes: &[Decimal]) -> Vec<Bar> {
    let mut open = dec!(10.00);
    closes
        .iter()
        .enumerate()
        .map(|(n, &close)| {
            let volume = if n == 0 { dec!(500) } else { dec!(10) };
            let bar = Bar {
                symbol: SYMBOL.to_string(),
                timestamp: minute(date, n),
                open,
                high: open.max(close),
                low: open.min(close),
                close,
                volume,
                amount: close * volume * dec!(100),
                prev_close: dec!(10.00),
            };
            open = close;
            bar
        })
        .collect()
}

pub fn config(universe: &[&str]) -> AppConfig {
    let mut config = AppConfig::default();
    config.strategy.universe = universe.iter().map(|s| s.to_string()).collect();
    config
}

/// Engine wired to a paper broker whose notifications are fed back in
pub struct Harness {
    pub trader: Trader,
    pub broker: Arc<PaperBroker>,
    pub rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl Harness {
    pub fn new(config: AppConfig) -> Self {
        Self::with_broker(config, PaperBrokerConfig::default())
    }

    pub fn with_broker(config: AppConfig, broker_config: PaperBrokerConfig) -> Self {
        let (tx, rx) = create_notification_channel();
        let broker = Arc::new(PaperBroker::new(broker_config).with_notifier(tx));
        let trader = Trader::new(config, broker.clone(), broker.clone());
        Self { trader, broker, rx }
    }

    /// Deliver a bar the way the binary does: quote first, then the engine
    pub fn bar(&mut self, bar: Bar) -> Option<OrderId> {
        self.broker.observe_bar(&bar);
        let order = self.trader.on_bar(bar);
        self.drain();
        order
    }

    /// Deliver bars, returning `(bar index, order id)` for each order placed
    pub fn run(&mut self, bars: Vec<Bar>) -> Vec<(usize, OrderId)> {
        bars.into_iter()
            .enumerate()
            .filter_map(|(n, bar)| self.bar(bar).map(|id| (n, id)))
            .collect()
    }

    pub fn next_day(&mut self) {
        self.broker.start_new_day();
    }

    /// Hand every pending broker notification to the engine
    pub fn drain(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.trader.handle(event);
        }
    }
}
