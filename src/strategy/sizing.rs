//! Order sizing and price helpers

use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use crate::common::types::{AccountSnapshot, PositionSnapshot};

/// Price tick for A-share quotes
pub const PRICE_TICK_DP: u32 = 2;

/// Whole lots of shares purchasable with `notional` at `price`
pub fn shares_for_notional(notional: Decimal, price: Decimal, lot_size: u64) -> u64 {
    if lot_size == 0 || notional <= Decimal::ZERO || price <= Decimal::ZERO {
        return 0;
    }
    let max_shares = (notional / price).floor().to_u64().unwrap_or(0);
    (max_shares / lot_size) * lot_size
}

/// Shares to sell for an exit of `fraction` of the held position.
///
/// A full exit sells everything sellable. A partial exit rounds down to whole
/// lots and is capped by what is sellable today; it may come out as zero for
/// small positions.
pub fn exit_shares(position: &PositionSnapshot, fraction: Decimal, lot_size: u64) -> u64 {
    if fraction >= Decimal::ONE {
        return position.available_qty;
    }
    let target = (Decimal::from(position.held_qty) * fraction)
        .floor()
        .to_u64()
        .unwrap_or(0);
    let lots = if lot_size == 0 { target } else { (target / lot_size) * lot_size };
    lots.min(position.available_qty)
}

/// Limit price `discount` below `price`, rounded down to the tick
pub fn discounted_limit(price: Decimal, discount: Decimal) -> Decimal {
    (price * (Decimal::ONE - discount)).round_dp_with_strategy(PRICE_TICK_DP, RoundingStrategy::ToZero)
}

/// True when adding `notional` would lift total holdings above `limit` of account value
pub fn exceeds_position_limit(account: &AccountSnapshot, notional: Decimal, limit: Decimal) -> bool {
    if account.total_value <= Decimal::ZERO {
        return true;
    }
    account.market_value + notional > account.total_value * limit
}
