//! In-memory order collaborator
//!
//! Keeps cash, holdings, quotes and orders behind one mutex. Market orders
//! fill at the last observed price when `auto_fill` is on; otherwise every
//! order stays working until filled or cancelled. Shares bought today only
//! become sellable after `start_new_day` (T+1).

use std::collections::HashMap;

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::common::errors::{EngineError, Result};
use crate::common::events::EngineEvent;
use crate::common::symbol::normalize_symbol;
use crate::common::traits::{Broker, ReferenceData};
use crate::common::types::{
    AccountSnapshot, Bar, OrderId, OrderPrice, OrderQuantity, OrderRequest, OrderStatus, PositionSnapshot, Side,
};
use crate::strategy::{shares_for_notional, PRICE_TICK_DP};

/// Daily price limit for main-board stocks
pub const MAIN_BOARD_LIMIT: Decimal = dec!(0.10);

/// Limit-up price from the previous close, rounded half-up to the tick
pub fn limit_up_price(prev_close: Decimal, limit: Decimal) -> Decimal {
    (prev_close * (Decimal::ONE + limit)).round_dp_with_strategy(PRICE_TICK_DP, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperBrokerConfig {
    pub initial_cash: Decimal,
    /// Fill marketable orders on submission
    pub auto_fill: bool,
    pub lot_size: u64,
}

impl Default for PaperBrokerConfig {
    fn default() -> Self {
        Self {
            initial_cash: dec!(1000000),
            auto_fill: true,
            lot_size: 100,
        }
    }
}

/// Collaborator calls that should fail, for exercising error paths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureInjection {
    pub position: bool,
    pub account: bool,
    pub submit: bool,
    pub cancel: bool,
    pub ceiling: bool,
}

/// One order as the paper venue sees it
#[derive(Debug, Clone, PartialEq)]
pub struct PaperOrder {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub shares: u64,
    pub limit: Option<Decimal>,
    pub status: OrderStatus,
    pub remark: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct Holding {
    held: u64,
    available: u64,
}

#[derive(Debug, Default)]
struct Inner {
    cash: Decimal,
    holdings: HashMap<String, Holding>,
    prices: HashMap<String, Decimal>,
    ceilings: HashMap<String, Decimal>,
    orders: HashMap<OrderId, PaperOrder>,
    next_id: u64,
    failures: FailureInjection,
}

pub struct PaperBroker {
    config: PaperBrokerConfig,
    inner: parking_lot::Mutex<Inner>,
    notifier: Option<mpsc::UnboundedSender<EngineEvent>>,
}

impl PaperBroker {
    pub fn new(config: PaperBrokerConfig) -> Self {
        let inner = Inner {
            cash: config.initial_cash,
            next_id: 1,
            ..Inner::default()
        };
        Self {
            config,
            inner: parking_lot::Mutex::new(inner),
            notifier: None,
        }
    }

    /// Push status and fill notifications into `sender`
    ///
    /// The channel is unbounded: a dropped fill would leave the order tracked.
    pub fn with_notifier(mut self, sender: mpsc::UnboundedSender<EngineEvent>) -> Self {
        self.notifier = Some(sender);
        self
    }

    /// Record the latest quote; the first bar of a symbol also sets its ceiling
    pub fn observe_bar(&self, bar: &Bar) {
        let symbol = normalize_symbol(&bar.symbol);
        let mut inner = self.inner.lock();
        inner.prices.insert(symbol.clone(), bar.close);
        inner
            .ceilings
            .entry(symbol)
            .or_insert_with(|| limit_up_price(bar.prev_close, MAIN_BOARD_LIMIT));
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.inner.lock().prices.insert(normalize_symbol(symbol), price);
    }

    pub fn set_ceiling(&self, symbol: &str, price: Decimal) {
        self.inner.lock().ceilings.insert(normalize_symbol(symbol), price);
    }

    /// Add shares held from before today
    pub fn seed_position(&self, symbol: &str, shares: u64) {
        let mut inner = self.inner.lock();
        let holding = inner.holdings.entry(normalize_symbol(symbol)).or_default();
        holding.held += shares;
        holding.available += shares;
    }

    /// Settle the day: everything held becomes sellable, ceilings are refreshed lazily
    pub fn start_new_day(&self) {
        let mut inner = self.inner.lock();
        for holding in inner.holdings.values_mut() {
            holding.available = holding.held;
        }
        inner.ceilings.clear();
        info!("Paper broker settled {} holdings", inner.holdings.len());
    }

    pub fn set_failures(&self, failures: FailureInjection) {
        self.inner.lock().failures = failures;
    }

    pub fn cash(&self) -> Decimal {
        self.inner.lock().cash
    }

    pub fn order(&self, order_id: &str) -> Option<PaperOrder> {
        self.inner.lock().orders.get(order_id).cloned()
    }

    /// All orders in submission order
    pub fn orders(&self) -> Vec<PaperOrder> {
        let inner = self.inner.lock();
        let mut orders: Vec<PaperOrder> = inner.orders.values().cloned().collect();
        orders.sort_by_key(|o| o.order_id.parse::<u64>().unwrap_or(u64::MAX));
        orders
    }

    /// Fill a working order at `price`
    pub fn fill(&self, order_id: &str, price: Decimal) -> Result<()> {
        let mut inner = self.inner.lock();
        let order = inner
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| EngineError::MissingState(format!("unknown order {}", order_id)))?;
        if order.status.is_terminal() {
            return Err(EngineError::InvalidData(format!(
                "order {} already {}",
                order_id, order.status
            )));
        }
        Self::execute(&mut inner, &order, price)?;
        drop(inner);
        self.notify_fill(order_id);
        Ok(())
    }

    fn execute(inner: &mut Inner, order: &PaperOrder, price: Decimal) -> Result<()> {
        let notional = price * Decimal::from(order.shares);
        match order.side {
            Side::Buy => {
                if notional > inner.cash {
                    return Err(EngineError::OrderRejected {
                        symbol: order.symbol.clone(),
                        reason: format!("insufficient cash for {}", notional),
                    });
                }
                inner.cash -= notional;
                // bought shares settle next day
                inner.holdings.entry(order.symbol.clone()).or_default().held += order.shares;
            }
            Side::Sell => {
                let holding = inner.holdings.entry(order.symbol.clone()).or_default();
                if order.shares > holding.available {
                    return Err(EngineError::OrderRejected {
                        symbol: order.symbol.clone(),
                        reason: format!("only {} shares sellable", holding.available),
                    });
                }
                holding.held -= order.shares;
                holding.available -= order.shares;
                inner.cash += notional;
            }
        }
        if let Some(stored) = inner.orders.get_mut(&order.order_id) {
            stored.status = OrderStatus::Filled;
        }
        info!(
            "Paper fill {} {} {} @ {} (order {})",
            order.side, order.shares, order.symbol, price, order.order_id
        );
        Ok(())
    }

    fn notify(&self, event: EngineEvent) {
        if let Some(sender) = &self.notifier {
            if let Err(e) = sender.send(event) {
                warn!("Broker notification not delivered: {}", e);
            }
        }
    }

    fn notify_fill(&self, order_id: &str) {
        self.notify(EngineEvent::OrderStatus {
            order_id: order_id.to_string(),
            status: OrderStatus::Filled,
        });
        self.notify(EngineEvent::TradeFill {
            order_id: order_id.to_string(),
        });
    }

    fn rejected(symbol: &str, reason: impl Into<String>) -> EngineError {
        EngineError::OrderRejected {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }
}

impl Default for PaperBroker {
    fn default() -> Self {
        Self::new(PaperBrokerConfig::default())
    }
}

impl Broker for PaperBroker {
    fn position(&self, symbol: &str) -> Result<Option<PositionSnapshot>> {
        let inner = self.inner.lock();
        if inner.failures.position {
            return Err(EngineError::Collaborator("position lookup unavailable".to_string()));
        }
        let symbol = normalize_symbol(symbol);
        let price = inner.prices.get(&symbol).copied().unwrap_or_default();
        Ok(inner
            .holdings
            .get(&symbol)
            .filter(|h| h.held > 0)
            .map(|h| PositionSnapshot {
                symbol: symbol.clone(),
                held_qty: h.held,
                available_qty: h.available,
                market_value: price * Decimal::from(h.held),
            }))
    }

    fn account(&self) -> Result<AccountSnapshot> {
        let inner = self.inner.lock();
        if inner.failures.account {
            return Err(EngineError::Collaborator("account lookup unavailable".to_string()));
        }
        let market_value: Decimal = inner
            .holdings
            .iter()
            .map(|(symbol, h)| inner.prices.get(symbol).copied().unwrap_or_default() * Decimal::from(h.held))
            .sum();
        Ok(AccountSnapshot {
            available_cash: inner.cash,
            total_value: inner.cash + market_value,
            market_value,
        })
    }

    fn submit_order(&self, request: &OrderRequest) -> Result<OrderId> {
        let symbol = normalize_symbol(&request.symbol);
        let mut inner = self.inner.lock();
        if inner.failures.submit {
            return Err(Self::rejected(&symbol, "submission unavailable"));
        }

        let last = inner.prices.get(&symbol).copied();
        let reference = match request.price {
            OrderPrice::Limit(price) => price,
            OrderPrice::Market => last.ok_or_else(|| Self::rejected(&symbol, "no quote"))?,
        };
        let shares = match request.quantity {
            OrderQuantity::Shares(shares) => shares,
            OrderQuantity::Notional(notional) => shares_for_notional(notional, reference, self.config.lot_size),
        };
        if shares == 0 {
            return Err(Self::rejected(&symbol, "quantity below one lot"));
        }
        if request.side == Side::Sell {
            let available = inner.holdings.get(&symbol).map(|h| h.available).unwrap_or(0);
            if shares > available {
                return Err(Self::rejected(&symbol, format!("only {} shares sellable", available)));
            }
        }

        let order_id = inner.next_id.to_string();
        let mut order = PaperOrder {
            order_id: order_id.clone(),
            symbol: symbol.clone(),
            side: request.side,
            shares,
            limit: match request.price {
                OrderPrice::Limit(price) => Some(price),
                OrderPrice::Market => None,
            },
            status: OrderStatus::Working,
            remark: request.remark.clone(),
        };

        // limit orders fill only when marketable against the last quote
        let fill_price = match (order.limit, last) {
            (None, Some(last)) => Some(last),
            (Some(limit), Some(last)) if order.side == Side::Sell && limit <= last => Some(last),
            (Some(limit), Some(last)) if order.side == Side::Buy && limit >= last => Some(last),
            _ => None,
        };

        if let Some(price) = fill_price.filter(|_| self.config.auto_fill) {
            // a fill the account cannot cover rejects the order before it is booked
            Self::execute(&mut inner, &order, price)?;
            order.status = OrderStatus::Filled;
        }
        inner.next_id += 1;
        inner.orders.insert(order_id.clone(), order.clone());
        drop(inner);
        debug!("Paper order {} accepted: {:?}", order_id, order);

        if order.status == OrderStatus::Filled {
            self.notify_fill(&order_id);
            return Ok(order_id);
        }
        self.notify(EngineEvent::OrderStatus {
            order_id: order_id.clone(),
            status: OrderStatus::Working,
        });
        Ok(order_id)
    }

    fn cancel_order(&self, order_id: &str) -> Result<bool> {
        let mut inner = self.inner.lock();
        if inner.failures.cancel {
            return Err(EngineError::CancelFailed {
                order_id: order_id.to_string(),
                reason: "cancel unavailable".to_string(),
            });
        }
        let order = inner.orders.get_mut(order_id).ok_or_else(|| EngineError::CancelFailed {
            order_id: order_id.to_string(),
            reason: "unknown order".to_string(),
        })?;
        if order.status.is_terminal() {
            // the caller missed the outcome; report it again
            let status = order.status;
            drop(inner);
            self.notify(EngineEvent::OrderStatus {
                order_id: order_id.to_string(),
                status,
            });
            return Ok(false);
        }
        order.status = OrderStatus::Cancelled;
        drop(inner);
        info!("Paper order {} cancelled", order_id);
        self.notify(EngineEvent::OrderStatus {
            order_id: order_id.to_string(),
            status: OrderStatus::Cancelled,
        });
        Ok(true)
    }
}

impl ReferenceData for PaperBroker {
    fn ceiling_price(&self, symbol: &str) -> Result<Decimal> {
        let inner = self.inner.lock();
        if inner.failures.ceiling {
            return Err(EngineError::Collaborator("reference data unavailable".to_string()));
        }
        let symbol = normalize_symbol(symbol);
        inner
            .ceilings
            .get(&symbol)
            .copied()
            .ok_or_else(|| EngineError::MissingState(format!("no ceiling price for {}", symbol)))
    }
}
