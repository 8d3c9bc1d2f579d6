//! Inbound notifications, one variant per kind

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::types::{Bar, OrderId, OrderStatus};

/// Everything the engine reacts to
///
/// Delivery mechanisms (feeds, broker callbacks, timers) translate their
/// callbacks into these values and the engine dispatches them synchronously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// A completed one-minute bar
    Bar(Bar),
    /// Periodic timer for the order sweep
    TimerTick(NaiveDateTime),
    /// Explicit start of a new trading day
    DayRollover(NaiveDate),
    /// Replace the selected universe
    ResetUniverse(Vec<String>),
    /// Order status push from the order collaborator
    OrderStatus { order_id: OrderId, status: OrderStatus },
    /// Fill push from the order collaborator
    TradeFill { order_id: OrderId },
    /// Order or cancel error push from the order collaborator
    OrderError { order_id: OrderId, message: String },
}

impl EngineEvent {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::Bar(_) => "bar",
            EngineEvent::TimerTick(_) => "timer_tick",
            EngineEvent::DayRollover(_) => "day_rollover",
            EngineEvent::ResetUniverse(_) => "reset_universe",
            EngineEvent::OrderStatus { .. } => "order_status",
            EngineEvent::TradeFill { .. } => "trade_fill",
            EngineEvent::OrderError { .. } => "order_error",
        }
    }
}
