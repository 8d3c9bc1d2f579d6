use crate::common::types::Bar;
use crate::strategy::state::SymbolDayState;
use crate::strategy::types::{Decision, OrderIntent, StrategyContext};

/// Core strategy trait
///
/// Strategies receive one bar at a time together with the symbol's day
/// state (already updated with that bar) and emit a Go/NoGo decision.
///
/// # Implementation Notes
///
/// - `on_bar` must be fast and must not perform I/O
/// - `on_bar` must not touch decision counters; they move in `on_submitted`
/// - Position/account info comes from StrategyContext (read-only)
/// - At most one decision per bar
pub trait Strategy: Send + Sync {
    /// Unique identifier for this strategy
    fn name(&self) -> &str;

    /// Called after `state` has absorbed `bar`
    ///
    /// # Returns
    /// * `Decision::NoGo` - No action
    /// * `Decision::Go(intent)` - Place the order
    fn on_bar(&mut self, bar: &Bar, state: &mut SymbolDayState, ctx: &StrategyContext) -> Decision;

    /// Called once the order collaborator accepted `intent`
    ///
    /// A rejected submission never reaches here, so the day state stays as
    /// it was and the symbol is evaluated again on the next bar.
    fn on_submitted(&mut self, bar: &Bar, intent: &OrderIntent, state: &mut SymbolDayState);

    /// Whether the strategy needs an account snapshot for buy decisions
    fn needs_account(&self) -> bool {
        false
    }
}

/// Boxed strategy for dynamic dispatch
pub type BoxedStrategy = Box<dyn Strategy>;
