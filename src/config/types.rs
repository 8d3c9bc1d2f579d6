//! Configuration types

use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Trading policy parameters
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Oscillator periods
    #[serde(default)]
    pub indicator: IndicatorConfig,
    /// Outstanding-order policy
    #[serde(default)]
    pub orders: OrderConfig,
    /// Trading calendar
    #[serde(default)]
    pub session: SessionConfig,
    /// Daily universe screening
    #[serde(default)]
    pub screening: ScreeningConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

/// Buy/sell policy parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Name recorded on every order
    #[serde(default = "default_strategy_name")]
    pub name: String,
    /// Notional amount spent per buy
    #[serde(default = "default_buy_amount")]
    pub buy_amount: Decimal,
    /// Maximum buys per symbol per day
    #[serde(default = "default_max_buy_times")]
    pub max_buy_times: u32,
    /// Maximum intraday gain (running high over previous close) as a fraction
    #[serde(default = "default_max_intraday_gain")]
    pub max_intraday_gain: Decimal,
    /// Refuse buys below the most recent buy price
    #[serde(default = "default_true")]
    pub price_protection: bool,
    /// Cap on total held market value as a fraction of account value
    #[serde(default)]
    pub position_limit: Option<Decimal>,
    /// Discount below the current price for the limit-up-break exit
    #[serde(default = "default_limit_break_discount")]
    pub limit_break_discount: Decimal,
    /// Shares per board lot
    #[serde(default = "default_lot_size")]
    pub lot_size: u64,
    /// Shares per reported volume unit (minute volume is reported in lots)
    #[serde(default = "default_volume_unit")]
    pub volume_unit: Decimal,
    /// Initially selected symbols
    #[serde(default)]
    pub universe: Vec<String>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            name: default_strategy_name(),
            buy_amount: default_buy_amount(),
            max_buy_times: default_max_buy_times(),
            max_intraday_gain: default_max_intraday_gain(),
            price_protection: true,
            position_limit: None,
            limit_break_discount: default_limit_break_discount(),
            lot_size: default_lot_size(),
            volume_unit: default_volume_unit(),
            universe: Vec::new(),
        }
    }
}

fn default_strategy_name() -> String {
    "first-pullback".to_string()
}

fn default_buy_amount() -> Decimal {
    dec!(20000)
}

fn default_max_buy_times() -> u32 {
    2
}

fn default_max_intraday_gain() -> Decimal {
    dec!(0.07)
}

fn default_true() -> bool {
    true
}

fn default_limit_break_discount() -> Decimal {
    dec!(0.005)
}

fn default_lot_size() -> u64 {
    100
}

fn default_volume_unit() -> Decimal {
    dec!(100)
}

/// Intraday oscillator periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    #[serde(default = "default_fast_period")]
    pub fast_period: u32,
    #[serde(default = "default_slow_period")]
    pub slow_period: u32,
    #[serde(default = "default_signal_period")]
    pub signal_period: u32,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            fast_period: default_fast_period(),
            slow_period: default_slow_period(),
            signal_period: default_signal_period(),
        }
    }
}

fn default_fast_period() -> u32 {
    12
}

fn default_slow_period() -> u32 {
    26
}

fn default_signal_period() -> u32 {
    9
}

/// Outstanding-order policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfig {
    /// Age after which a working order is cancelled
    #[serde(default = "default_order_timeout")]
    pub timeout_seconds: u64,
    /// Interval of the periodic sweep
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_order_timeout(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

fn default_order_timeout() -> u64 {
    180
}

fn default_sweep_interval() -> u64 {
    30
}

/// A continuous time window inside the trading day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SessionWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time <= self.end
    }
}

/// Trading calendar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Start of continuous trading
    #[serde(default = "default_open_time")]
    pub open_time: NaiveTime,
    /// Windows in which bars are processed
    #[serde(default = "default_sessions")]
    pub sessions: Vec<SessionWindow>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            open_time: default_open_time(),
            sessions: default_sessions(),
        }
    }
}

fn hms(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

fn default_open_time() -> NaiveTime {
    hms(9, 30)
}

fn default_sessions() -> Vec<SessionWindow> {
    vec![
        // opening call auction
        SessionWindow::new(hms(9, 15), hms(9, 25)),
        SessionWindow::new(hms(9, 30), hms(11, 30)),
        // afternoon continuous trading and closing call auction
        SessionWindow::new(hms(13, 0), hms(15, 0)),
    ]
}

/// Daily universe screening criteria
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningConfig {
    /// The limit-up must be the only one in this many recent daily bars
    #[serde(default = "default_first_limit_up_days")]
    pub first_limit_up_days: usize,
    /// The limit-up close must be the highest close in this many daily bars
    #[serde(default = "default_new_high_days")]
    pub new_high_days: usize,
    /// Maximum total market value in currency
    #[serde(default = "default_max_market_value")]
    pub max_market_value: Decimal,
    #[serde(default = "default_true")]
    pub main_board_only: bool,
    #[serde(default = "default_true")]
    pub exclude_st: bool,
    #[serde(default = "default_true")]
    pub exclude_suspended: bool,
    #[serde(default = "default_true")]
    pub exclude_one_word_board: bool,
    /// Daily change treated as a limit-up close
    #[serde(default = "default_limit_up_threshold")]
    pub limit_up_threshold: Decimal,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            first_limit_up_days: default_first_limit_up_days(),
            new_high_days: default_new_high_days(),
            max_market_value: default_max_market_value(),
            main_board_only: true,
            exclude_st: true,
            exclude_suspended: true,
            exclude_one_word_board: true,
            limit_up_threshold: default_limit_up_threshold(),
        }
    }
}

fn default_first_limit_up_days() -> usize {
    3
}

fn default_new_high_days() -> usize {
    30
}

fn default_max_market_value() -> Decimal {
    dec!(15000000000)
}

fn default_limit_up_threshold() -> Decimal {
    dec!(0.095)
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Capacity of the inbound event channel
    #[serde(default = "default_event_channel_size")]
    pub event_channel_size: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            event_channel_size: default_event_channel_size(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_event_channel_size() -> usize {
    1000
}
