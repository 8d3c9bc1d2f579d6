//! Strategy module for trade decision making
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    HOT PATH (sync, per bar)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Bar arrives                                                │
//! │       │                                                     │
//! │       ▼                                                     │
//! │  SymbolDayState.apply_bar()  (closes, MACD, high, VWAP)     │
//! │       │                                                     │
//! │       ▼                                                     │
//! │  Strategy.on_bar() → Go/NoGo                                │
//! │       │                                                     │
//! │       ▼ (if Go)                                             │
//! │  Trader                                                     │
//! │    - Submits the order to the broker                        │
//! │    - On acceptance: Strategy.on_submitted() moves counters  │
//! │    - Registers it with the lifecycle manager                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`Strategy`]: Trait for implementing trading strategies
//! - [`Decision`]: Go/NoGo enum returned by strategies
//! - [`OrderIntent`]: The single order a Go decision carries
//! - [`SymbolDayState`]: Per-(symbol, day) derived series and counters
//! - [`FirstPullbackStrategy`]: Entry and exit rules for the pullback setup

mod pullback;
mod sizing;
mod state;
mod traits;
mod types;

pub use pullback::FirstPullbackStrategy;
pub use sizing::{discounted_limit, exceeds_position_limit, exit_shares, shares_for_notional, PRICE_TICK_DP};
pub use state::{DayKey, SymbolDayState};
pub use traits::{BoxedStrategy, Strategy};
pub use types::{Decision, OrderIntent, SignalReason, StrategyContext};
