//! Pullback Trader Library
//!
//! An intraday engine for the "first pullback after the first limit-up"
//! equity setup: one-minute bars in, buy and sell orders out.

pub mod broker;
pub mod common;
pub mod config;
pub mod feed;
pub mod indicator;
pub mod orders;
pub mod screening;
pub mod session;
pub mod strategy;
pub mod trader;

// Re-export commonly used types
pub use common::errors::{EngineError, Result};
pub use common::events::EngineEvent;
pub use common::traits::{BarFeed, Broker, ReferenceData};
pub use common::types::{
    AccountSnapshot, Bar, OrderId, OrderPrice, OrderQuantity, OrderRequest, OrderStatus, PositionSnapshot, RawBar,
    Side,
};
pub use crate::config::types::AppConfig;
pub use trader::Trader;

// Engine components
pub use indicator::{HistogramPattern, IntradayMacd, MacdPoint, OscillatorState};
pub use orders::{ActiveOrder, OrderLifecycleManager, SweepOutcome};
pub use session::{SessionClock, TradingHours};
pub use strategy::{
    BoxedStrategy, DayKey, Decision, FirstPullbackStrategy, OrderIntent, SignalReason, Strategy, StrategyContext,
    SymbolDayState,
};
