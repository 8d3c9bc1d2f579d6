//! Engine entry points
//!
//! `Trader` owns every piece of day-scoped state and routes each inbound
//! notification to the component that handles it. All handlers run to
//! completion before returning; collaborator failures are logged and turn
//! into "no action" for the event being processed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use tracing::{debug, info, warn};

use crate::common::events::EngineEvent;
use crate::common::symbol::normalize_symbol;
use crate::common::traits::{Broker, ReferenceData};
use crate::common::types::{Bar, OrderId, OrderStatus};
use crate::config::AppConfig;
use crate::indicator::IntradayMacd;
use crate::orders::{OrderLifecycleManager, SweepOutcome};
use crate::session::{SessionClock, TradingHours};
use crate::strategy::{BoxedStrategy, DayKey, Decision, FirstPullbackStrategy, StrategyContext, SymbolDayState};

pub struct Trader {
    config: AppConfig,
    strategy: BoxedStrategy,
    macd: IntradayMacd,
    clock: SessionClock,
    hours: TradingHours,
    states: HashMap<DayKey, SymbolDayState>,
    universe: HashSet<String>,
    orders: Arc<OrderLifecycleManager>,
    broker: Arc<dyn Broker>,
    reference: Arc<dyn ReferenceData>,
    /// Minute of the last sweep triggered from the bar path
    last_sweep_minute: Option<NaiveDateTime>,
}

impl Trader {
    /// Build a trader running the first-pullback strategy
    pub fn new(config: AppConfig, broker: Arc<dyn Broker>, reference: Arc<dyn ReferenceData>) -> Self {
        let strategy = Box::new(FirstPullbackStrategy::new(config.strategy.clone()));
        Self::with_strategy(config, strategy, broker, reference)
    }

    pub fn with_strategy(
        config: AppConfig,
        strategy: BoxedStrategy,
        broker: Arc<dyn Broker>,
        reference: Arc<dyn ReferenceData>,
    ) -> Self {
        let universe = config.strategy.universe.iter().map(|s| normalize_symbol(s)).collect();
        Self {
            macd: IntradayMacd::from_config(&config.indicator),
            clock: SessionClock::from_config(&config.session),
            hours: TradingHours::from_config(&config.session),
            orders: Arc::new(OrderLifecycleManager::from_config(&config.orders)),
            states: HashMap::new(),
            universe,
            strategy,
            broker,
            reference,
            last_sweep_minute: None,
            config,
        }
    }

    /// Dispatch one inbound event
    pub fn handle(&mut self, event: EngineEvent) {
        debug!("Handling {} event", event.kind());
        match event {
            EngineEvent::Bar(bar) => {
                self.on_bar(bar);
            }
            EngineEvent::TimerTick(now) => {
                self.on_timer_tick(now);
            }
            EngineEvent::DayRollover(day) => self.on_day_rollover(day),
            EngineEvent::ResetUniverse(symbols) => self.reset_universe(symbols),
            EngineEvent::OrderStatus { order_id, status } => self.on_order_status(&order_id, status),
            EngineEvent::TradeFill { order_id } => self.on_trade_fill(&order_id),
            EngineEvent::OrderError { order_id, message } => self.on_order_error(&order_id, &message),
        }
    }

    /// Process one completed bar. Returns the id of the order it placed, if any.
    pub fn on_bar(&mut self, mut bar: Bar) -> Option<OrderId> {
        bar.symbol = normalize_symbol(&bar.symbol);
        let now = bar.timestamp;

        if !self.hours.is_trading_time(now) {
            debug!(symbol = %bar.symbol, time = %now, "bar outside trading hours ignored");
            return None;
        }

        if let Some(day) = self.clock.observe(now) {
            self.start_day(day);
        }

        self.sweep_once_per_minute(now);

        let key = DayKey::new(bar.symbol.clone(), bar.trading_day());
        let volume_unit = self.config.strategy.volume_unit;
        let state = self
            .states
            .entry(key.clone())
            .or_insert_with(|| SymbolDayState::new(key, volume_unit));
        let point = state.apply_bar(&bar, &self.macd);
        debug!(
            symbol = %bar.symbol,
            close = %bar.close,
            dif = %point.dif,
            dea = %point.dea,
            hist = %point.histogram,
            "bar applied"
        );

        if state.ceiling_price().is_none() {
            match self.reference.ceiling_price(&bar.symbol) {
                Ok(price) => state.set_ceiling_price(price),
                Err(e) => warn!(symbol = %bar.symbol, error = %e, "ceiling price lookup failed"),
            }
        }

        let in_universe = self.universe.contains(&bar.symbol);
        let position = match self.broker.position(&bar.symbol) {
            Ok(position) => Some(position),
            Err(e) => {
                warn!(symbol = %bar.symbol, error = %e, "position lookup failed");
                None
            }
        };
        let account = if in_universe && self.strategy.needs_account() {
            match self.broker.account() {
                Ok(account) => Some(account),
                Err(e) => {
                    warn!(symbol = %bar.symbol, error = %e, "account lookup failed");
                    None
                }
            }
        } else {
            None
        };

        let ctx = StrategyContext {
            in_universe,
            position,
            account,
            is_opening_bar: self.clock.is_opening_bar(now),
        };

        let intent = match self.strategy.on_bar(&bar, state, &ctx) {
            Decision::NoGo => return None,
            Decision::Go(intent) => intent,
        };

        let request = intent.to_request(self.strategy.name());
        match self.broker.submit_order(&request) {
            Ok(order_id) => {
                info!(
                    order_id = %order_id,
                    symbol = %request.symbol,
                    side = %request.side,
                    quantity = ?request.quantity,
                    price = ?request.price,
                    reason = %intent.reason,
                    "order submitted"
                );
                self.strategy.on_submitted(&bar, &intent, state);
                self.orders.register(order_id.clone(), request.symbol, request.side, now);
                Some(order_id)
            }
            Err(e) => {
                // day state is untouched, the next bar is evaluated afresh
                warn!(symbol = %request.symbol, reason = %intent.reason, error = %e, "order submission failed");
                None
            }
        }
    }

    /// Periodic sweep trigger
    pub fn on_timer_tick(&mut self, now: NaiveDateTime) -> SweepOutcome {
        let outcome = self.orders.sweep(now, self.broker.as_ref());
        if !outcome.is_empty() {
            info!(
                "Sweep at {}: {} cancelled, {} failed",
                now,
                outcome.cancelled.len(),
                outcome.failed.len()
            );
        }
        outcome
    }

    /// Explicit start of a trading day
    pub fn on_day_rollover(&mut self, day: NaiveDate) {
        if self.clock.advance_to(day) {
            self.start_day(day);
        }
    }

    /// Replace the selected universe
    ///
    /// State for every symbol whose membership changed is discarded.
    pub fn reset_universe(&mut self, symbols: Vec<String>) {
        let next: HashSet<String> = symbols.iter().map(|s| normalize_symbol(s)).collect();
        let changed: HashSet<String> = self.universe.symmetric_difference(&next).cloned().collect();
        self.states.retain(|key, _| !changed.contains(&key.symbol));
        info!(
            "Universe reset: {} symbols ({} changed)",
            next.len(),
            changed.len()
        );
        self.universe = next;
    }

    pub fn on_order_status(&mut self, order_id: &str, status: OrderStatus) {
        if let Some(order) = self.orders.on_status(order_id, status) {
            info!(order_id, symbol = %order.symbol, %status, "order finished");
        }
    }

    pub fn on_trade_fill(&mut self, order_id: &str) {
        if let Some(order) = self.orders.reconcile(order_id) {
            info!(order_id, symbol = %order.symbol, "order filled");
        }
    }

    /// Error push from the order collaborator, logged once per order
    pub fn on_order_error(&mut self, order_id: &str, message: &str) {
        if self.orders.record_error(order_id) {
            warn!(order_id, message, "order error");
        } else {
            debug!(order_id, message, "repeated order error");
        }
    }

    fn start_day(&mut self, day: NaiveDate) {
        let dropped = self.states.len();
        self.states.clear();
        self.last_sweep_minute = None;
        info!("Started trading day {} ({} symbol states dropped)", day, dropped);
    }

    fn sweep_once_per_minute(&mut self, now: NaiveDateTime) {
        let minute = now.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(now);
        if self.last_sweep_minute == Some(minute) {
            return;
        }
        self.last_sweep_minute = Some(minute);
        self.on_timer_tick(now);
    }

    /// Lifecycle manager shared with the periodic sweep task
    pub fn orders(&self) -> Arc<OrderLifecycleManager> {
        Arc::clone(&self.orders)
    }

    pub fn broker(&self) -> Arc<dyn Broker> {
        Arc::clone(&self.broker)
    }

    pub fn state(&self, symbol: &str, day: NaiveDate) -> Option<&SymbolDayState> {
        self.states.get(&DayKey::new(normalize_symbol(symbol), day))
    }

    pub fn current_day(&self) -> Option<NaiveDate> {
        self.clock.current_day()
    }

    pub fn universe(&self) -> &HashSet<String> {
        &self.universe
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::errors::EngineError;
    use crate::common::traits::{MockBroker, MockReferenceData};
    use crate::common::types::{OrderPrice, OrderQuantity, PositionSnapshot, Side};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const SYMBOL: &str = "600000.SH";

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn bar(time: &str, open: Decimal, close: Decimal) -> Bar {
        Bar {
            symbol: "600000".to_string(),
            timestamp: ts(time),
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: dec!(10),
            amount: close * dec!(1000),
            prev_close: dec!(10.00),
        }
    }

    fn config(universe: &[&str]) -> AppConfig {
        let mut config = AppConfig::default();
        config.strategy.universe = universe.iter().map(|s| s.to_string()).collect();
        config
    }

    fn ceiling(price: Decimal) -> MockReferenceData {
        let mut reference = MockReferenceData::new();
        reference.expect_ceiling_price().returning(move |_| Ok(price));
        reference
    }

    fn aged(qty: u64) -> Option<PositionSnapshot> {
        Some(PositionSnapshot {
            symbol: SYMBOL.to_string(),
            held_qty: qty,
            available_qty: qty,
            market_value: Decimal::from(qty) * dec!(10),
        })
    }

    fn trader(config: AppConfig, broker: MockBroker, reference: MockReferenceData) -> Trader {
        Trader::new(config, Arc::new(broker), Arc::new(reference))
    }

    #[test_log::test]
    fn test_gap_down_open_submits_full_exit() {
        let mut broker = MockBroker::new();
        broker.expect_position().returning(|_| Ok(aged(2000)));
        broker
            .expect_submit_order()
            .withf(|req| {
                req.symbol == SYMBOL
                    && req.side == Side::Sell
                    && req.quantity == OrderQuantity::Shares(2000)
                    && req.price == OrderPrice::Market
                    && req.remark == "first-pullback:gap-down-open"
            })
            .times(1)
            .returning(|_| Ok("42".to_string()));

        let mut trader = trader(config(&[]), broker, ceiling(dec!(11.00)));
        let order = trader.on_bar(bar("2024-03-01 09:31:00", dec!(9.80), dec!(9.70)));

        assert_eq!(order.as_deref(), Some("42"));
        assert!(trader.orders().contains("42"));
        assert_eq!(trader.orders().get("42").unwrap().submitted_at, ts("2024-03-01 09:31:00"));
    }

    #[test]
    fn test_position_lookup_failure_means_no_order() {
        let mut broker = MockBroker::new();
        broker
            .expect_position()
            .returning(|_| Err(EngineError::Collaborator("timeout".to_string())));
        broker.expect_submit_order().never();

        let mut trader = trader(config(&[SYMBOL]), broker, ceiling(dec!(11.00)));
        assert!(trader.on_bar(bar("2024-03-01 09:31:00", dec!(9.80), dec!(9.70))).is_none());
        assert_eq!(trader.state(SYMBOL, ts("2024-03-01 09:31:00").date()).unwrap().bar_count(), 1);
    }

    #[test]
    fn test_ceiling_failure_is_retried_on_next_bar() {
        let mut reference = MockReferenceData::new();
        let mut seq = mockall::Sequence::new();
        reference
            .expect_ceiling_price()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(EngineError::Collaborator("down".to_string())));
        reference
            .expect_ceiling_price()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(dec!(11.00)));

        let mut broker = MockBroker::new();
        broker.expect_position().returning(|_| Ok(None));

        let mut trader = trader(config(&[]), broker, reference);
        let day = ts("2024-03-01 09:31:00").date();
        trader.on_bar(bar("2024-03-01 09:31:00", dec!(10.00), dec!(10.10)));
        assert_eq!(trader.state(SYMBOL, day).unwrap().ceiling_price(), None);

        trader.on_bar(bar("2024-03-01 09:32:00", dec!(10.10), dec!(10.20)));
        trader.on_bar(bar("2024-03-01 09:33:00", dec!(10.20), dec!(10.30)));
        assert_eq!(trader.state(SYMBOL, day).unwrap().ceiling_price(), Some(dec!(11.00)));
    }

    #[test]
    fn test_submission_failure_is_absorbed() {
        let mut broker = MockBroker::new();
        broker.expect_position().returning(|_| Ok(aged(2000)));
        broker.expect_submit_order().times(1).returning(|req| {
            Err(EngineError::OrderRejected {
                symbol: req.symbol.clone(),
                reason: "closed".to_string(),
            })
        });

        let mut trader = trader(config(&[]), broker, ceiling(dec!(11.00)));
        assert!(trader.on_bar(bar("2024-03-01 09:31:00", dec!(9.80), dec!(9.70))).is_none());
        assert!(trader.orders().is_empty());
    }

    #[test]
    fn test_rejected_buy_keeps_buy_budget() {
        let mut broker = MockBroker::new();
        broker.expect_position().returning(|_| Ok(None));
        let mut seq = mockall::Sequence::new();
        broker
            .expect_submit_order()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|req| {
                Err(EngineError::OrderRejected {
                    symbol: req.symbol.clone(),
                    reason: "busy".to_string(),
                })
            });
        broker
            .expect_submit_order()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("7".to_string()));

        let mut cfg = config(&[SYMBOL]);
        cfg.strategy.max_buy_times = 1;
        let mut trader = trader(cfg, broker, ceiling(dec!(11.00)));
        let day = ts("2024-03-01 10:00:00").date();

        // rally, pull back, recover: the negative histogram shrinks on bars 13 and 14
        let closes = [
            dec!(10.00), dec!(10.10), dec!(10.20), dec!(10.30), dec!(10.40), dec!(10.30), dec!(10.20), dec!(10.10),
            dec!(10.05), dec!(10.05), dec!(10.06), dec!(10.08), dec!(10.10), dec!(10.14), dec!(10.18),
        ];
        let mut open = dec!(10.00);
        let mut placed = Vec::new();
        for (n, &close) in closes.iter().enumerate() {
            let mut b = bar(&format!("2024-03-01 10:{:02}:00", n), open, close);
            if n == 0 {
                // heavy first bar keeps VWAP near the open
                b.volume = dec!(500);
                b.amount = dec!(500000);
            }
            open = close;
            if let Some(id) = trader.on_bar(b) {
                placed.push((n, id));
            }
            if n == 13 {
                // first attempt was rejected by the venue
                let state = trader.state(SYMBOL, day).unwrap();
                assert_eq!(state.buy_count(), 0);
                assert!(state.buy_prices().is_empty());
            }
        }

        assert_eq!(placed, vec![(14, "7".to_string())]);
        let state = trader.state(SYMBOL, day).unwrap();
        assert_eq!(state.buy_count(), 1);
        assert_eq!(state.buy_prices(), &[dec!(10.18)]);
    }

    #[test]
    fn test_bars_outside_trading_hours_are_ignored() {
        let mut broker = MockBroker::new();
        broker.expect_position().never();
        let mut trader = trader(config(&[SYMBOL]), broker, MockReferenceData::new());

        assert!(trader.on_bar(bar("2024-03-01 12:00:00", dec!(10), dec!(10))).is_none());
        assert!(trader.on_bar(bar("2024-03-02 10:00:00", dec!(10), dec!(10))).is_none());
        assert_eq!(trader.current_day(), None);
    }

    #[test]
    fn test_new_day_drops_previous_state() {
        let mut broker = MockBroker::new();
        broker.expect_position().returning(|_| Ok(None));
        let mut trader = trader(config(&[SYMBOL]), broker, ceiling(dec!(11.00)));

        trader.on_bar(bar("2024-03-01 10:00:00", dec!(10), dec!(10.1)));
        trader.on_bar(bar("2024-03-04 10:00:00", dec!(10), dec!(10.1)));

        assert!(trader.state(SYMBOL, ts("2024-03-01 10:00:00").date()).is_none());
        assert_eq!(trader.state(SYMBOL, ts("2024-03-04 10:00:00").date()).unwrap().bar_count(), 1);
        assert_eq!(trader.current_day(), Some(ts("2024-03-04 10:00:00").date()));
    }

    #[test]
    fn test_explicit_rollover_clears_state() {
        let mut broker = MockBroker::new();
        broker.expect_position().returning(|_| Ok(None));
        let mut trader = trader(config(&[SYMBOL]), broker, ceiling(dec!(11.00)));
        let day = ts("2024-03-01 10:00:00").date();

        trader.on_bar(bar("2024-03-01 10:00:00", dec!(10), dec!(10.1)));
        trader.on_day_rollover(day);
        assert!(trader.state(SYMBOL, day).is_some());

        let next = ts("2024-03-04 00:00:00").date();
        trader.on_day_rollover(next);
        assert!(trader.state(SYMBOL, day).is_none());
        assert_eq!(trader.current_day(), Some(next));
    }

    #[test]
    fn test_reset_universe_drops_changed_symbols() {
        let mut broker = MockBroker::new();
        broker.expect_position().returning(|_| Ok(None));
        let mut trader = trader(config(&["600000", "000001"]), broker, ceiling(dec!(11.00)));
        let day = ts("2024-03-01 10:00:00").date();

        let mut other = bar("2024-03-01 10:00:00", dec!(10), dec!(10.1));
        other.symbol = "000001".to_string();
        trader.on_bar(bar("2024-03-01 10:00:00", dec!(10), dec!(10.1)));
        trader.on_bar(other);

        trader.reset_universe(vec!["000001.SZ".to_string(), "600519".to_string()]);

        assert!(trader.state(SYMBOL, day).is_none());
        assert!(trader.state("000001.SZ", day).is_some());
        assert!(trader.universe().contains("600519.SH"));
        assert!(!trader.universe().contains(SYMBOL));
    }

    #[test]
    fn test_status_and_fill_reconcile() {
        let mut broker = MockBroker::new();
        broker.expect_position().returning(|_| Ok(aged(2000)));
        broker.expect_submit_order().returning(|_| Ok("1".to_string()));
        let mut trader = trader(config(&[]), broker, ceiling(dec!(11.00)));
        trader.on_bar(bar("2024-03-01 09:31:00", dec!(9.80), dec!(9.70)));

        trader.handle(EngineEvent::OrderStatus {
            order_id: "1".to_string(),
            status: OrderStatus::Working,
        });
        assert!(trader.orders().contains("1"));

        trader.handle(EngineEvent::TradeFill { order_id: "1".to_string() });
        assert!(trader.orders().is_empty());

        // late duplicate is harmless
        trader.handle(EngineEvent::OrderStatus {
            order_id: "1".to_string(),
            status: OrderStatus::Filled,
        });
        assert!(trader.orders().is_empty());
    }

    #[test]
    fn test_bar_path_sweeps_once_per_minute() {
        let mut broker = MockBroker::new();
        broker.expect_position().returning(|_| Ok(aged(2000)));
        broker.expect_submit_order().returning(|_| Ok("1".to_string()));
        broker.expect_cancel_order().times(1).returning(|_| Ok(true));
        let mut trader = trader(config(&[]), broker, ceiling(dec!(11.00)));

        trader.on_bar(bar("2024-03-01 09:31:00", dec!(9.80), dec!(9.70)));
        assert!(trader.orders().contains("1"));

        // still young
        trader.on_bar(bar("2024-03-01 09:33:00", dec!(9.70), dec!(9.70)));
        assert!(trader.orders().contains("1"));

        trader.on_bar(bar("2024-03-01 09:35:00", dec!(9.70), dec!(9.70)));
        assert!(trader.orders().is_empty());
    }

    #[test]
    fn test_timer_tick_sweeps() {
        let mut broker = MockBroker::new();
        broker.expect_position().returning(|_| Ok(aged(2000)));
        broker.expect_submit_order().returning(|_| Ok("1".to_string()));
        broker
            .expect_cancel_order()
            .times(1)
            .returning(|id| Err(EngineError::CancelFailed {
                order_id: id.to_string(),
                reason: "denied".to_string(),
            }));
        let mut trader = trader(config(&[]), broker, ceiling(dec!(11.00)));
        trader.on_bar(bar("2024-03-01 09:31:00", dec!(9.80), dec!(9.70)));

        let outcome = trader.on_timer_tick(ts("2024-03-01 09:35:00"));
        assert_eq!(outcome.failed, vec!["1".to_string()]);
        assert!(trader.orders().contains("1"));
    }

    #[test]
    fn test_order_error_is_logged_once() {
        let mut trader = trader(config(&[]), MockBroker::new(), MockReferenceData::new());
        trader.on_order_error("9", "rejected by exchange");
        trader.on_order_error("9", "rejected by exchange");
        assert!(!trader.orders().record_error("9"));
    }
}
