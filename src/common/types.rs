//! Unified types shared by the engine and its collaborators

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::errors::{EngineError, Result};

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Opaque order identifier assigned by the order collaborator
pub type OrderId = String;

/// One minute of aggregated market data for a symbol
///
/// Prices are exchange-local wall clock; `amount` and `volume` cover this
/// minute only and are accumulated by the per-day state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Traded volume in the collaborator's volume unit
    pub volume: Decimal,
    /// Traded turnover in currency
    pub amount: Decimal,
    /// Previous session's close
    pub prev_close: Decimal,
}

impl Bar {
    /// Trading day this bar belongs to
    pub fn trading_day(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// True if the candle closed below its open
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Normalize a loosely-typed bar.
    ///
    /// Unusable numeric fields are coerced: prices fall back to the close
    /// (or open, or previous close), volume and amount to zero, and high/low
    /// are widened to bracket open and close. Only a bar with no usable price
    /// at all, no symbol, or no parseable timestamp is rejected.
    pub fn from_raw(raw: RawBar) -> Result<Self> {
        let symbol = raw.symbol.trim().to_string();
        if symbol.is_empty() {
            return Err(EngineError::InvalidData("bar without symbol".to_string()));
        }

        let timestamp = raw.timestamp().ok_or_else(|| {
            EngineError::InvalidData(format!("{}: unparseable bar time {:?}", symbol, raw.time))
        })?;

        let open = positive(raw.open);
        let prev_close = positive(raw.pre_close);
        let close = positive(raw.close)
            .or(open)
            .or(prev_close)
            .ok_or_else(|| EngineError::InvalidData(format!("{}: bar has no usable price", symbol)))?;
        let open = open.unwrap_or(close);
        let high = positive(raw.high).unwrap_or(close).max(open).max(close);
        let low = positive(raw.low).unwrap_or(close).min(open).min(close);

        Ok(Self {
            symbol,
            timestamp,
            open,
            high,
            low,
            close,
            volume: non_negative(raw.volume),
            amount: non_negative(raw.amount),
            prev_close: prev_close.unwrap_or(open),
        })
    }
}

fn to_decimal(value: Option<f64>) -> Option<Decimal> {
    value
        .filter(|v| v.is_finite())
        .and_then(Decimal::from_f64)
}

fn positive(value: Option<f64>) -> Option<Decimal> {
    to_decimal(value).filter(|d| d.is_sign_positive() && !d.is_zero())
}

fn non_negative(value: Option<f64>) -> Decimal {
    to_decimal(value)
        .filter(|d| !d.is_sign_negative())
        .unwrap_or(Decimal::ZERO)
}

/// Bar as delivered by a market-data source, before normalization
///
/// Numeric fields accept numbers or numeric strings; anything else reads as
/// missing. `time` is either `YYYY-MM-DD HH:MM:SS`, `YYYYMMDDHHMMSS`, or epoch
/// milliseconds (interpreted in exchange time, UTC+8).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBar {
    #[serde(alias = "stock_code", alias = "code")]
    pub symbol: String,
    #[serde(default)]
    pub time: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub open: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub high: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub low: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub close: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub volume: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: Option<f64>,
    #[serde(default, alias = "preClose", deserialize_with = "lenient_f64")]
    pub pre_close: Option<f64>,
}

impl RawBar {
    fn timestamp(&self) -> Option<NaiveDateTime> {
        match self.time.as_ref()? {
            serde_json::Value::Number(n) => {
                let millis = n.as_i64()?;
                let offset = FixedOffset::east_opt(8 * 3600)?;
                DateTime::from_timestamp_millis(millis).map(|t| t.with_timezone(&offset).naive_local())
            }
            serde_json::Value::String(s) => {
                let s = s.trim();
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y%m%d%H%M%S"))
                    .ok()
            }
            _ => None,
        }
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// Holdings for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: String,
    /// Total shares held
    pub held_qty: u64,
    /// Shares that may be sold today
    pub available_qty: u64,
    pub market_value: Decimal,
}

impl PositionSnapshot {
    pub fn is_open(&self) -> bool {
        self.held_qty > 0
    }

    /// Every held share predates today (nothing bought today is still held)
    pub fn is_aged(&self) -> bool {
        self.held_qty > 0 && self.available_qty == self.held_qty
    }
}

/// Account-level balances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub available_cash: Decimal,
    pub total_value: Decimal,
    /// Market value of all holdings
    pub market_value: Decimal,
}

/// How an order is priced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderPrice {
    /// Latest-price market order
    Market,
    /// Fixed-price limit order
    Limit(Decimal),
}

/// How an order is sized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderQuantity {
    /// Share count
    Shares(u64),
    /// Currency amount, converted to whole lots by the order collaborator
    Notional(Decimal),
}

/// A fully specified order handed to the order collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub quantity: OrderQuantity,
    pub price: OrderPrice,
    /// Free-form tag recorded with the order
    pub remark: String,
}

/// Order status reported by the order collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Submitted,
    Working,
    PartiallyFilled,
    Filled,
    Cancelled,
    PartiallyCancelled,
    Rejected,
    Unknown,
}

impl OrderStatus {
    /// Status after which the order no longer needs tracking
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::PartiallyFilled
                | OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::PartiallyCancelled
                | OrderStatus::Rejected
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Submitted => "SUBMITTED",
            OrderStatus::Working => "WORKING",
            OrderStatus::PartiallyFilled => "PARTIAL",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::PartiallyCancelled => "PARTIAL_CANCELLED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Unknown => "UNKNOWN",
        };
        write!(f, "{}", s)
    }
}
