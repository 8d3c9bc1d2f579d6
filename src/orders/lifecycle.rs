//! Outstanding-order tracking and timeout cancellation

use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDateTime};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::common::traits::Broker;
use crate::common::types::{OrderId, OrderStatus, Side};
use crate::config::OrderConfig;

/// One order awaiting a terminal status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveOrder {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub submitted_at: NaiveDateTime,
    /// A sweep has a cancel request in flight for this order
    cancelling: bool,
}

impl ActiveOrder {
    pub fn age(&self, now: NaiveDateTime) -> Duration {
        now - self.submitted_at
    }

    pub fn is_cancelling(&self) -> bool {
        self.cancelling
    }
}

/// Result of one sweep pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Orders whose cancel was accepted and are no longer tracked
    pub cancelled: Vec<OrderId>,
    /// Orders whose cancel failed and stay tracked
    pub failed: Vec<OrderId>,
}

impl SweepOutcome {
    pub fn is_empty(&self) -> bool {
        self.cancelled.is_empty() && self.failed.is_empty()
    }
}

#[derive(Debug, Default)]
struct Inner {
    orders: HashMap<OrderId, ActiveOrder>,
    /// Orders that already produced an error notification
    errored: HashSet<OrderId>,
}

/// Tracks submitted orders until they reach a terminal status
///
/// Shared between the bar path and the periodic sweep task, so every
/// method takes `&self` and serializes access through one mutex. The lock
/// is never held across a broker call.
#[derive(Debug)]
pub struct OrderLifecycleManager {
    timeout: Duration,
    inner: Mutex<Inner>,
}

impl OrderLifecycleManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn from_config(config: &OrderConfig) -> Self {
        Self::new(Duration::seconds(config.timeout_seconds as i64))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start tracking an order. Returns false if the id is already tracked,
    /// in which case the original submission time is kept.
    pub fn register(&self, order_id: impl Into<OrderId>, symbol: impl Into<String>, side: Side, now: NaiveDateTime) -> bool {
        let order_id = order_id.into();
        let mut inner = self.inner.lock();
        if inner.orders.contains_key(&order_id) {
            debug!(order_id = %order_id, "order already tracked");
            return false;
        }
        let order = ActiveOrder {
            order_id: order_id.clone(),
            symbol: symbol.into(),
            side,
            submitted_at: now,
            cancelling: false,
        };
        debug!(order_id = %order_id, symbol = %order.symbol, side = %side, "tracking order");
        inner.orders.insert(order_id, order);
        true
    }

    /// Stop tracking an order; only the first call for an id returns it
    pub fn reconcile(&self, order_id: &str) -> Option<ActiveOrder> {
        let removed = self.inner.lock().orders.remove(order_id);
        if let Some(order) = &removed {
            debug!(order_id, symbol = %order.symbol, "order reconciled");
        }
        removed
    }

    /// Apply a status push; terminal statuses end tracking
    pub fn on_status(&self, order_id: &str, status: OrderStatus) -> Option<ActiveOrder> {
        if status.is_terminal() {
            self.reconcile(order_id)
        } else {
            debug!(order_id, %status, "non-terminal status");
            None
        }
    }

    /// Record an error push. Returns true the first time an order errors.
    pub fn record_error(&self, order_id: &str) -> bool {
        self.inner.lock().errored.insert(order_id.to_string())
    }

    /// Cancel every order older than the timeout
    ///
    /// Expired orders are claimed under the lock, cancelled without it, and
    /// removed only when the broker accepts the cancel. A concurrent sweep
    /// skips orders another sweep has already claimed.
    pub fn sweep(&self, now: NaiveDateTime, broker: &dyn Broker) -> SweepOutcome {
        let expired: Vec<ActiveOrder> = {
            let mut inner = self.inner.lock();
            inner
                .orders
                .values_mut()
                .filter(|order| !order.cancelling && order.age(now) > self.timeout)
                .map(|order| {
                    order.cancelling = true;
                    order.clone()
                })
                .collect()
        };

        let mut outcome = SweepOutcome::default();
        for order in expired {
            let accepted = match broker.cancel_order(&order.order_id) {
                Ok(true) => true,
                Ok(false) => {
                    warn!(order_id = %order.order_id, symbol = %order.symbol, "cancel refused");
                    false
                }
                Err(e) => {
                    warn!(order_id = %order.order_id, symbol = %order.symbol, error = %e, "cancel failed");
                    false
                }
            };

            let mut inner = self.inner.lock();
            if accepted {
                if inner.orders.remove(&order.order_id).is_some() {
                    info!(
                        order_id = %order.order_id,
                        symbol = %order.symbol,
                        age_secs = order.age(now).num_seconds(),
                        "cancelled timed-out order"
                    );
                }
                outcome.cancelled.push(order.order_id);
            } else {
                if let Some(tracked) = inner.orders.get_mut(&order.order_id) {
                    tracked.cancelling = false;
                }
                outcome.failed.push(order.order_id);
            }
        }
        outcome
    }

    pub fn get(&self, order_id: &str) -> Option<ActiveOrder> {
        self.inner.lock().orders.get(order_id).cloned()
    }

    pub fn contains(&self, order_id: &str) -> bool {
        self.inner.lock().orders.contains_key(order_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().orders.is_empty()
    }

    /// Ids of all tracked orders, sorted
    pub fn order_ids(&self) -> Vec<OrderId> {
        let mut ids: Vec<OrderId> = self.inner.lock().orders.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for OrderLifecycleManager {
    fn default() -> Self {
        Self::from_config(&OrderConfig::default())
    }
}
