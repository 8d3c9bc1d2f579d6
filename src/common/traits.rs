//! Trait definitions for the engine's collaborators

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use super::errors::Result;
use super::events::EngineEvent;
use super::types::{AccountSnapshot, OrderId, OrderRequest, PositionSnapshot};

/// Reference data that changes at most once per trading day
#[cfg_attr(test, mockall::automock)]
pub trait ReferenceData: Send + Sync {
    /// Today's limit-up price for a symbol
    fn ceiling_price(&self, symbol: &str) -> Result<Decimal>;
}

/// Account, position and order access
///
/// Every call is a plain request/response; the engine never retries on its
/// own and treats an `Err` as "no action" for the current bar.
#[cfg_attr(test, mockall::automock)]
pub trait Broker: Send + Sync {
    /// Holdings for a symbol, `None` when nothing is held
    fn position(&self, symbol: &str) -> Result<Option<PositionSnapshot>>;

    /// Account balances
    fn account(&self) -> Result<AccountSnapshot>;

    /// Submit an order and return the collaborator-assigned id
    fn submit_order(&self, request: &OrderRequest) -> Result<OrderId>;

    /// Request cancellation; `Ok(true)` once the request is accepted
    fn cancel_order(&self, order_id: &str) -> Result<bool>;
}

/// Source of one-minute bars
///
/// Implementations push [`EngineEvent::Bar`] values into the provided channel
/// until the source is exhausted or the receiver is dropped.
#[async_trait]
pub trait BarFeed: Send + Sync {
    /// Start delivering events
    async fn start(&mut self, sender: mpsc::Sender<EngineEvent>) -> Result<()>;

    /// Name used in logs
    fn source_name(&self) -> &str;
}
