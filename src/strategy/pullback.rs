//! First pullback after a first limit-up
//!
//! Buys a selected symbol when the intraday histogram shows a shrinking
//! negative run while price holds above the session VWAP, and exits on one
//! of three rules, checked in priority order:
//!
//! 1. gap-down open with a bearish first candle (full exit, market)
//! 2. break off the limit-up price (full exit, discounted limit)
//! 3. shrinking positive run below the limit-up price (half, then the rest)

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};

use crate::common::types::{Bar, PositionSnapshot};
use crate::config::StrategyConfig;
use crate::indicator::{is_shrinking_negative, is_shrinking_positive};
use crate::strategy::sizing::{discounted_limit, exceeds_position_limit, exit_shares};
use crate::strategy::state::SymbolDayState;
use crate::strategy::traits::Strategy;
use crate::strategy::types::{Decision, OrderIntent, SignalReason, StrategyContext};

const HALF: Decimal = dec!(0.5);

pub struct FirstPullbackStrategy {
    config: StrategyConfig,
}

impl FirstPullbackStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Entry guards. The buy is recorded only once the order is accepted.
    pub fn evaluate_buy(&self, bar: &Bar, state: &SymbolDayState, ctx: &StrategyContext) -> Decision {
        let symbol = bar.symbol.as_str();

        if state.buy_count() >= self.config.max_buy_times {
            debug!(symbol, buys = state.buy_count(), "buy limit reached");
            return Decision::NoGo;
        }

        let Some(position) = ctx.position.as_ref() else {
            warn!(symbol, "position unavailable, skipping buy evaluation");
            return Decision::NoGo;
        };
        if position.as_ref().is_some_and(PositionSnapshot::is_aged) {
            debug!(symbol, "holding shares from a previous day, no buy");
            return Decision::NoGo;
        }

        if !is_shrinking_negative(state.histogram()) {
            return Decision::NoGo;
        }

        let Some(high) = state.running_high() else {
            return Decision::NoGo;
        };
        if bar.prev_close > Decimal::ZERO {
            let gain = (high - bar.prev_close) / bar.prev_close;
            if gain > self.config.max_intraday_gain {
                debug!(symbol, %gain, "intraday gain above limit");
                return Decision::NoGo;
            }
        }

        match state.vwap() {
            Some(vwap) if bar.close > vwap => {}
            vwap => {
                debug!(symbol, close = %bar.close, ?vwap, "price not above VWAP");
                return Decision::NoGo;
            }
        }

        if self.config.price_protection {
            if let Some(&last) = state.buy_prices().last() {
                if bar.close < last {
                    debug!(symbol, close = %bar.close, last_buy = %last, "below last buy price");
                    return Decision::NoGo;
                }
            }
        }

        if let Some(limit) = self.config.position_limit {
            let Some(account) = ctx.account.as_ref() else {
                warn!(symbol, "account snapshot unavailable, skipping buy");
                return Decision::NoGo;
            };
            if exceeds_position_limit(account, self.config.buy_amount, limit) {
                debug!(symbol, %limit, "position limit would be exceeded");
                return Decision::NoGo;
            }
        }

        info!(
            symbol,
            price = %bar.close,
            amount = %self.config.buy_amount,
            buy_no = state.buy_count() + 1,
            "pullback entry"
        );
        Decision::Go(OrderIntent::buy(symbol, self.config.buy_amount, SignalReason::PullbackEntry))
    }

    /// Exit rules for a held position; at most one fires per bar
    pub fn evaluate_sell(
        &self,
        bar: &Bar,
        state: &SymbolDayState,
        position: &PositionSnapshot,
        opening_bar: bool,
    ) -> Decision {
        let symbol = bar.symbol.as_str();

        if position.available_qty == 0 {
            debug!(symbol, held = position.held_qty, "nothing sellable today");
            return Decision::NoGo;
        }

        if opening_bar && bar.open < bar.prev_close && bar.is_bearish() {
            info!(
                symbol,
                open = %bar.open,
                close = %bar.close,
                prev_close = %bar.prev_close,
                "gap-down open with bearish first candle"
            );
            return Decision::Go(OrderIntent::sell(
                symbol,
                position.available_qty,
                Decimal::ONE,
                SignalReason::GapDownOpen,
            ));
        }

        let Some(ceiling) = state.ceiling_price() else {
            warn!(symbol, "ceiling price unavailable, skipping exit rules");
            return Decision::NoGo;
        };

        if let Some(previous) = state.previous_close() {
            if previous >= ceiling && bar.close < ceiling {
                let limit = discounted_limit(bar.close, self.config.limit_break_discount);
                info!(symbol, %ceiling, close = %bar.close, %limit, "limit-up broken");
                return Decision::Go(
                    OrderIntent::sell(symbol, position.available_qty, Decimal::ONE, SignalReason::LimitUpBreak)
                        .with_limit(limit),
                );
            }
        }

        if bar.close < ceiling && is_shrinking_positive(state.histogram()) {
            let fraction = if state.sell_count() == 0 { HALF } else { Decimal::ONE };
            let mut shares = exit_shares(position, fraction, self.config.lot_size);
            if shares == 0 {
                // a half that rounds below one lot closes what is sellable
                shares = position.available_qty;
            }
            info!(
                symbol,
                %fraction,
                shares,
                trigger = state.sell_count() + 1,
                "oscillator exhaustion"
            );
            return Decision::Go(OrderIntent::sell(
                symbol,
                shares,
                fraction,
                SignalReason::OscillatorExhaustion,
            ));
        }

        Decision::NoGo
    }
}

impl Strategy for FirstPullbackStrategy {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn on_bar(&mut self, bar: &Bar, state: &mut SymbolDayState, ctx: &StrategyContext) -> Decision {
        let opening_bar = ctx.is_opening_bar && !state.opening_checked;
        if ctx.is_opening_bar {
            state.opening_checked = true;
        }

        if let Some(position) = ctx.held_position() {
            let decision = self.evaluate_sell(bar, state, position, opening_bar);
            if decision.is_go() {
                return decision;
            }
        }

        if ctx.in_universe {
            return self.evaluate_buy(bar, state, ctx);
        }

        Decision::NoGo
    }

    fn on_submitted(&mut self, bar: &Bar, intent: &OrderIntent, state: &mut SymbolDayState) {
        match intent.reason {
            SignalReason::PullbackEntry => state.record_buy(bar.close),
            SignalReason::OscillatorExhaustion => state.record_sell(),
            SignalReason::GapDownOpen | SignalReason::LimitUpBreak => {}
        }
    }

    fn needs_account(&self) -> bool {
        self.config.position_limit.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{AccountSnapshot, OrderPrice, OrderQuantity, Side};
    use crate::indicator::IntradayMacd;
    use crate::strategy::state::DayKey;
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;

    const SYMBOL: &str = "600000.SH";

    fn ts(time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("2024-03-01 {}", time), "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn bar(time: &str, open: Decimal, close: Decimal) -> Bar {
        Bar {
            symbol: SYMBOL.to_string(),
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

    fn state() -> SymbolDayState {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        SymbolDayState::new(DayKey::new(SYMBOL, day), dec!(100))
    }

    /// State whose derived values are set directly, bypassing the indicator
    fn primed_state(histogram: &[Decimal], closes: &[Decimal], vwap: Decimal, high: Decimal) -> SymbolDayState {
        let mut s = state();
        s.histogram = histogram.to_vec();
        s.closes = closes.to_vec();
        s.running_high = Some(high);
        s.cum_volume = dec!(1);
        s.cum_amount = vwap * dec!(100);
        s
    }

    fn strategy() -> FirstPullbackStrategy {
        FirstPullbackStrategy::new(StrategyConfig::default())
    }

    fn flat_ctx(in_universe: bool) -> StrategyContext {
        StrategyContext {
            in_universe,
            position: Some(None),
            account: None,
            is_opening_bar: false,
        }
    }

    fn held(held: u64, available: u64) -> PositionSnapshot {
        PositionSnapshot {
            symbol: SYMBOL.to_string(),
            held_qty: held,
            available_qty: available,
            market_value: Decimal::from(held) * dec!(10),
        }
    }

    /// Decide on `bar` and, on a Go, report the order as accepted
    fn decide_and_submit(
        strategy: &mut FirstPullbackStrategy,
        bar: &Bar,
        state: &mut SymbolDayState,
        ctx: &StrategyContext,
    ) -> Decision {
        let decision = strategy.on_bar(bar, state, ctx);
        if let Some(intent) = decision.intent() {
            strategy.on_submitted(bar, intent, state);
        }
        decision
    }

    fn shrinking_negative() -> Vec<Decimal> {
        vec![dec!(-0.05), dec!(-0.03), dec!(-0.01)]
    }

    #[test]
    fn test_buy_when_all_guards_pass() {
        let mut s = primed_state(&shrinking_negative(), &[dec!(10.20)], dec!(10.10), dec!(10.30));
        let decision = decide_and_submit(&mut strategy(), &bar("10:00:00", dec!(10.15), dec!(10.20)), &mut s, &flat_ctx(true));

        let intent = decision.intent().expect("expected a buy");
        assert_eq!(intent.side, Side::Buy);
        assert_eq!(intent.quantity, OrderQuantity::Notional(dec!(20000)));
        assert_eq!(intent.price, OrderPrice::Market);
        assert_eq!(intent.reason, SignalReason::PullbackEntry);
        assert_eq!(s.buy_count(), 1);
        assert_eq!(s.buy_prices(), &[dec!(10.20)]);
    }

    #[test]
    fn test_no_buy_outside_universe() {
        let mut s = primed_state(&shrinking_negative(), &[dec!(10.20)], dec!(10.10), dec!(10.30));
        let decision = strategy().on_bar(&bar("10:00:00", dec!(10.15), dec!(10.20)), &mut s, &flat_ctx(false));
        assert_eq!(decision, Decision::NoGo);
    }

    #[test]
    fn test_buy_decision_leaves_counters_until_accepted() {
        let mut s = primed_state(&shrinking_negative(), &[dec!(10.20)], dec!(10.10), dec!(10.30));
        let mut strategy = strategy();
        let b = bar("10:00:00", dec!(10.15), dec!(10.20));

        // a rejected submission never reports back
        assert!(strategy.on_bar(&b, &mut s, &flat_ctx(true)).is_go());
        assert_eq!(s.buy_count(), 0);
        assert!(s.buy_prices().is_empty());

        let decision = strategy.on_bar(&b, &mut s, &flat_ctx(true));
        strategy.on_submitted(&b, decision.intent().unwrap(), &mut s);
        assert_eq!(s.buy_count(), 1);
        assert_eq!(s.buy_prices(), &[dec!(10.20)]);
    }

    #[test]
    fn test_no_buy_at_buy_limit() {
        let mut s = primed_state(&shrinking_negative(), &[dec!(10.20)], dec!(10.10), dec!(10.30));
        s.record_buy(dec!(10.00));
        s.record_buy(dec!(10.10));

        let decision = strategy().on_bar(&bar("10:00:00", dec!(10.15), dec!(10.20)), &mut s, &flat_ctx(true));
        assert_eq!(decision, Decision::NoGo);
        assert_eq!(s.buy_count(), 2);
    }

    #[test]
    fn test_no_buy_on_aged_position() {
        let mut s = primed_state(&shrinking_negative(), &[dec!(10.20)], dec!(10.10), dec!(10.30));
        let mut ctx = flat_ctx(true);
        // aged holding with no sellable trigger
        ctx.position = Some(Some(held(1000, 1000)));
        s.ceiling_price = Some(dec!(11.00));

        let decision = strategy().on_bar(&bar("10:00:00", dec!(10.15), dec!(10.20)), &mut s, &ctx);
        assert_eq!(decision, Decision::NoGo);
    }

    #[test]
    fn test_buy_while_holding_todays_shares() {
        let mut s = primed_state(&shrinking_negative(), &[dec!(10.20)], dec!(10.10), dec!(10.30));
        s.record_buy(dec!(10.00));
        let mut ctx = flat_ctx(true);
        ctx.position = Some(Some(held(1900, 0)));

        let decision = decide_and_submit(&mut strategy(), &bar("10:00:00", dec!(10.15), dec!(10.20)), &mut s, &ctx);
        assert!(decision.is_go());
        assert_eq!(s.buy_count(), 2);
    }

    #[test]
    fn test_no_buy_when_position_lookup_failed() {
        let mut s = primed_state(&shrinking_negative(), &[dec!(10.20)], dec!(10.10), dec!(10.30));
        let mut ctx = flat_ctx(true);
        ctx.position = None;

        let decision = strategy().on_bar(&bar("10:00:00", dec!(10.15), dec!(10.20)), &mut s, &ctx);
        assert_eq!(decision, Decision::NoGo);
        assert_eq!(s.buy_count(), 0);
    }

    #[test]
    fn test_no_buy_without_pattern() {
        let mut s = primed_state(&[dec!(-0.01), dec!(-0.03), dec!(-0.05)], &[dec!(10.20)], dec!(10.10), dec!(10.30));
        let decision = strategy().on_bar(&bar("10:00:00", dec!(10.15), dec!(10.20)), &mut s, &flat_ctx(true));
        assert_eq!(decision, Decision::NoGo);
    }

    #[test]
    fn test_no_buy_after_large_intraday_gain() {
        // high 10.80 is 8% over the 10.00 previous close
        let mut s = primed_state(&shrinking_negative(), &[dec!(10.20)], dec!(10.10), dec!(10.80));
        let decision = strategy().on_bar(&bar("10:00:00", dec!(10.15), dec!(10.20)), &mut s, &flat_ctx(true));
        assert_eq!(decision, Decision::NoGo);
    }

    #[test]
    fn test_no_buy_below_vwap() {
        let mut s = primed_state(&shrinking_negative(), &[dec!(10.20)], dec!(10.25), dec!(10.30));
        let decision = strategy().on_bar(&bar("10:00:00", dec!(10.15), dec!(10.20)), &mut s, &flat_ctx(true));
        assert_eq!(decision, Decision::NoGo);
    }

    #[test]
    fn test_price_protection_blocks_lower_second_buy() {
        let mut s = primed_state(&shrinking_negative(), &[dec!(9.90)], dec!(9.80), dec!(10.30));
        s.record_buy(dec!(10.00));

        let decision = strategy().on_bar(&bar("10:30:00", dec!(9.95), dec!(9.90)), &mut s, &flat_ctx(true));
        assert_eq!(decision, Decision::NoGo);
        assert_eq!(s.buy_count(), 1);
    }

    #[test]
    fn test_price_protection_can_be_disabled() {
        let mut s = primed_state(&shrinking_negative(), &[dec!(9.90)], dec!(9.80), dec!(10.30));
        s.record_buy(dec!(10.00));
        let mut strategy = FirstPullbackStrategy::new(StrategyConfig {
            price_protection: false,
            ..StrategyConfig::default()
        });

        let decision = strategy.on_bar(&bar("10:30:00", dec!(9.95), dec!(9.90)), &mut s, &flat_ctx(true));
        assert!(decision.is_go());
    }

    #[test]
    fn test_position_limit_guard() {
        let mut strategy = FirstPullbackStrategy::new(StrategyConfig {
            position_limit: Some(dec!(0.5)),
            ..StrategyConfig::default()
        });
        assert!(strategy.needs_account());

        let mut s = primed_state(&shrinking_negative(), &[dec!(10.20)], dec!(10.10), dec!(10.30));
        let mut ctx = flat_ctx(true);

        // no snapshot: no action
        assert_eq!(strategy.on_bar(&bar("10:00:00", dec!(10.15), dec!(10.20)), &mut s, &ctx), Decision::NoGo);

        ctx.account = Some(AccountSnapshot {
            available_cash: dec!(60000),
            total_value: dec!(100000),
            market_value: dec!(40000),
        });
        assert_eq!(strategy.on_bar(&bar("10:00:00", dec!(10.15), dec!(10.20)), &mut s, &ctx), Decision::NoGo);

        ctx.account = Some(AccountSnapshot {
            available_cash: dec!(90000),
            total_value: dec!(100000),
            market_value: dec!(10000),
        });
        assert!(strategy.on_bar(&bar("10:00:00", dec!(10.15), dec!(10.20)), &mut s, &ctx).is_go());
    }

    #[test]
    fn test_gap_down_open_forces_full_exit() {
        let mut s = state();
        let macd = IntradayMacd::default();
        let first = bar("09:31:00", dec!(9.80), dec!(9.70));
        s.apply_bar(&first, &macd);

        let mut ctx = flat_ctx(false);
        ctx.position = Some(Some(held(2000, 2000)));
        ctx.is_opening_bar = true;

        let decision = strategy().on_bar(&first, &mut s, &ctx);
        let intent = decision.intent().expect("expected an exit");
        assert_eq!(intent.side, Side::Sell);
        assert_eq!(intent.quantity, OrderQuantity::Shares(2000));
        assert_eq!(intent.exit_fraction, Some(Decimal::ONE));
        assert_eq!(intent.reason, SignalReason::GapDownOpen);
        assert_eq!(intent.price, OrderPrice::Market);
    }

    #[test]
    fn test_gap_down_only_checked_once() {
        let mut s = state();
        let first = bar("09:31:00", dec!(9.80), dec!(9.70));
        let mut ctx = flat_ctx(false);
        ctx.position = Some(Some(held(2000, 2000)));
        ctx.is_opening_bar = true;
        s.opening_checked = true;
        s.ceiling_price = Some(dec!(11.00));

        assert_eq!(strategy().on_bar(&first, &mut s, &ctx), Decision::NoGo);
    }

    #[test]
    fn test_gap_down_needs_bearish_candle() {
        let mut s = state();
        s.ceiling_price = Some(dec!(11.00));
        let first = bar("09:31:00", dec!(9.80), dec!(9.90));
        let mut ctx = flat_ctx(false);
        ctx.position = Some(Some(held(2000, 2000)));
        ctx.is_opening_bar = true;

        assert_eq!(strategy().on_bar(&first, &mut s, &ctx), Decision::NoGo);
        assert!(s.opening_checked);
    }

    #[test]
    fn test_limit_up_break_exits_with_discounted_limit() {
        let mut s = primed_state(&[dec!(0.1)], &[dec!(11.00), dec!(10.90)], dec!(10.50), dec!(11.00));
        s.ceiling_price = Some(dec!(11.00));

        let decision = strategy().evaluate_sell(&bar("10:15:00", dec!(11.00), dec!(10.90)), &s, &held(2000, 2000), false);
        let intent = decision.intent().expect("expected an exit");
        assert_eq!(intent.reason, SignalReason::LimitUpBreak);
        assert_eq!(intent.quantity, OrderQuantity::Shares(2000));
        // 10.90 * 0.995 = 10.8455
        assert_eq!(intent.price, OrderPrice::Limit(dec!(10.84)));
    }

    #[test]
    fn test_limit_up_hold_is_not_a_break() {
        let mut s = primed_state(&[dec!(0.1)], &[dec!(11.00), dec!(11.00)], dec!(10.50), dec!(11.00));
        s.ceiling_price = Some(dec!(11.00));

        let decision = strategy().evaluate_sell(&bar("10:15:00", dec!(11.00), dec!(11.00)), &s, &held(2000, 2000), false);
        assert_eq!(decision, Decision::NoGo);
    }

    #[test]
    fn test_exhaustion_sells_half_then_rest() {
        let mut s = primed_state(&[dec!(5), dec!(3), dec!(1)], &[dec!(10.60), dec!(10.50)], dec!(10.30), dec!(10.70));
        s.ceiling_price = Some(dec!(11.00));
        let mut strategy = strategy();

        let b = bar("10:40:00", dec!(10.55), dec!(10.50));
        let first = strategy.evaluate_sell(&b, &s, &held(2000, 2000), false);
        let intent = first.intent().expect("expected first exit");
        assert_eq!(intent.exit_fraction, Some(dec!(0.5)));
        assert_eq!(intent.quantity, OrderQuantity::Shares(1000));
        assert_eq!(s.sell_count(), 0);
        strategy.on_submitted(&b, intent, &mut s);
        assert_eq!(s.sell_count(), 1);

        s.histogram.push(dec!(0.5));
        let b = bar("10:41:00", dec!(10.50), dec!(10.45));
        let second = strategy.evaluate_sell(&b, &s, &held(1000, 1000), false);
        let intent = second.intent().expect("expected second exit");
        assert_eq!(intent.exit_fraction, Some(Decimal::ONE));
        assert_eq!(intent.quantity, OrderQuantity::Shares(1000));
        strategy.on_submitted(&b, intent, &mut s);
        assert_eq!(s.sell_count(), 2);
    }

    #[test]
    fn test_unaccepted_exhaustion_exit_still_sells_half() {
        let mut s = primed_state(&[dec!(5), dec!(3), dec!(1)], &[dec!(10.60), dec!(10.50)], dec!(10.30), dec!(10.70));
        s.ceiling_price = Some(dec!(11.00));
        let strategy = strategy();

        // first trigger rejected by the venue, second bar tries again
        strategy.evaluate_sell(&bar("10:40:00", dec!(10.55), dec!(10.50)), &s, &held(2000, 2000), false);
        s.histogram.push(dec!(0.5));
        let retry = strategy.evaluate_sell(&bar("10:41:00", dec!(10.50), dec!(10.45)), &s, &held(2000, 2000), false);

        let intent = retry.intent().expect("expected exit");
        assert_eq!(intent.exit_fraction, Some(dec!(0.5)));
        assert_eq!(intent.quantity, OrderQuantity::Shares(1000));
        assert_eq!(s.sell_count(), 0);
    }

    #[test]
    fn test_no_exhaustion_exit_at_ceiling() {
        let mut s = primed_state(&[dec!(5), dec!(3), dec!(1)], &[dec!(11.00), dec!(11.00)], dec!(10.30), dec!(11.00));
        s.ceiling_price = Some(dec!(11.00));

        let decision = strategy().evaluate_sell(&bar("10:40:00", dec!(11.00), dec!(11.00)), &s, &held(2000, 2000), false);
        assert_eq!(decision, Decision::NoGo);
        assert_eq!(s.sell_count(), 0);
    }

    #[test]
    fn test_missing_ceiling_means_no_exit() {
        let s = primed_state(&[dec!(5), dec!(3), dec!(1)], &[dec!(10.60), dec!(10.50)], dec!(10.30), dec!(10.70));

        let decision = strategy().evaluate_sell(&bar("10:40:00", dec!(10.55), dec!(10.50)), &s, &held(2000, 2000), false);
        assert_eq!(decision, Decision::NoGo);
        assert_eq!(s.sell_count(), 0);
    }

    #[test]
    fn test_gap_down_preempts_limit_break() {
        let mut s = primed_state(&[dec!(5), dec!(3), dec!(1)], &[dec!(11.00), dec!(9.70)], dec!(10.30), dec!(11.00));
        s.ceiling_price = Some(dec!(11.00));

        let decision = strategy().evaluate_sell(&bar("09:31:00", dec!(9.80), dec!(9.70)), &s, &held(2000, 2000), true);
        assert_eq!(decision.intent().map(|i| i.reason), Some(SignalReason::GapDownOpen));
        assert_eq!(s.sell_count(), 0);
    }

    #[test]
    fn test_nothing_sellable_means_no_exit() {
        let mut s = primed_state(&[dec!(5), dec!(3), dec!(1)], &[dec!(10.60), dec!(10.50)], dec!(10.30), dec!(10.70));
        s.ceiling_price = Some(dec!(11.00));

        let decision = strategy().evaluate_sell(&bar("10:40:00", dec!(10.55), dec!(10.50)), &s, &held(2000, 0), false);
        assert_eq!(decision, Decision::NoGo);
    }
}
