use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::types::{AccountSnapshot, OrderPrice, OrderQuantity, OrderRequest, PositionSnapshot, Side};

/// Why an order was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalReason {
    /// Negative histogram shrinking above VWAP
    PullbackEntry,
    /// Opened below previous close and the first candle closed bearish
    GapDownOpen,
    /// Dropped off the limit-up price
    LimitUpBreak,
    /// Positive histogram shrinking below the limit-up price
    OscillatorExhaustion,
}

impl std::fmt::Display for SignalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalReason::PullbackEntry => write!(f, "pullback-entry"),
            SignalReason::GapDownOpen => write!(f, "gap-down-open"),
            SignalReason::LimitUpBreak => write!(f, "limit-up-break"),
            SignalReason::OscillatorExhaustion => write!(f, "oscillator-exhaustion"),
        }
    }
}

/// A single order the strategy wants placed
///
/// Sells carry the fraction of the held position they close; the quantity
/// is already resolved to whole shares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: Side,
    pub quantity: OrderQuantity,
    pub price: OrderPrice,
    /// Fraction of the position closed by a sell (1 = full exit)
    pub exit_fraction: Option<Decimal>,
    pub reason: SignalReason,
}

impl OrderIntent {
    pub fn buy(symbol: impl Into<String>, notional: Decimal, reason: SignalReason) -> Self {
        Self {
            symbol: symbol.into(),
            side: Side::Buy,
            quantity: OrderQuantity::Notional(notional),
            price: OrderPrice::Market,
            exit_fraction: None,
            reason,
        }
    }

    pub fn sell(symbol: impl Into<String>, shares: u64, fraction: Decimal, reason: SignalReason) -> Self {
        Self {
            symbol: symbol.into(),
            side: Side::Sell,
            quantity: OrderQuantity::Shares(shares),
            price: OrderPrice::Market,
            exit_fraction: Some(fraction),
            reason,
        }
    }

    pub fn with_limit(mut self, price: Decimal) -> Self {
        self.price = OrderPrice::Limit(price);
        self
    }

    /// Request in the shape the order collaborator accepts
    pub fn to_request(&self, strategy_name: &str) -> OrderRequest {
        OrderRequest {
            symbol: self.symbol.clone(),
            side: self.side,
            quantity: self.quantity,
            price: self.price,
            remark: format!("{}:{}", strategy_name, self.reason),
        }
    }
}

/// Strategy decision output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No action should be taken
    NoGo,
    /// Place the order
    Go(OrderIntent),
}

impl Decision {
    /// Returns true if this is a Go decision
    pub fn is_go(&self) -> bool {
        matches!(self, Self::Go(_))
    }

    pub fn intent(&self) -> Option<&OrderIntent> {
        match self {
            Self::Go(intent) => Some(intent),
            Self::NoGo => None,
        }
    }
}

/// Context provided to strategies by the Trader
///
/// Collaborator lookups the Trader made for this bar. A `None` means the
/// lookup failed (or was not needed) and any guard depending on it must
/// resolve to no action.
#[derive(Debug, Clone, Default)]
pub struct StrategyContext {
    /// Symbol is in today's selected universe
    pub in_universe: bool,
    /// Position lookup; `Some(None)` when the lookup succeeded and nothing is held
    pub position: Option<Option<PositionSnapshot>>,
    /// Account lookup
    pub account: Option<AccountSnapshot>,
    /// This bar is the opening candle of the session
    pub is_opening_bar: bool,
}

impl StrategyContext {
    /// Held position, if the lookup succeeded and something is held
    pub fn held_position(&self) -> Option<&PositionSnapshot> {
        self.position
            .as_ref()
            .and_then(|p| p.as_ref())
            .filter(|p| p.is_open())
    }
}
