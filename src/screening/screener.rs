//! Daily universe selection
//!
//! Picks symbols whose most recent daily bar is the first limit-up close in
//! a short window and a fresh multi-week closing high. Runs once before the
//! session; its output feeds `Trader::reset_universe`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::common::errors::{EngineError, Result};
use crate::common::symbol::{is_main_board, normalize_symbol};
use crate::config::ScreeningConfig;

/// Volume below this share of the previous day's marks a one-word board
const ONE_WORD_VOLUME_RATIO: Decimal = dec!(0.2);

/// One daily candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Static facts about a listed stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockInfo {
    pub symbol: String,
    pub name: String,
    pub suspended: bool,
    /// Total market value in currency units
    pub total_market_value: Decimal,
}

/// A stock together with its recent daily history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub info: StockInfo,
    pub daily: Vec<DailyBar>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Suspended,
    SpecialTreatment,
    NotMainBoard,
    MarketValueTooLarge,
    InsufficientHistory,
    NotLimitUp,
    OneWordBoard,
    NotFirstLimitUp,
    NotNewHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Selected,
    Rejected(RejectReason),
}

pub struct UniverseScreener {
    config: ScreeningConfig,
}

impl UniverseScreener {
    pub fn new(config: ScreeningConfig) -> Self {
        Self { config }
    }

    /// Normalized symbols of every selected candidate
    ///
    /// A candidate whose data cannot be evaluated is skipped and logged.
    pub fn screen(&self, candidates: &[Candidate]) -> Vec<String> {
        let mut selected = Vec::new();
        for candidate in candidates {
            match self.evaluate(candidate) {
                Ok(Verdict::Selected) => {
                    info!("Selected {} ({})", candidate.info.symbol, candidate.info.name);
                    selected.push(normalize_symbol(&candidate.info.symbol));
                }
                Ok(Verdict::Rejected(reason)) => {
                    debug!("Rejected {}: {:?}", candidate.info.symbol, reason);
                }
                Err(e) => warn!("Screening failed for {}: {}", candidate.info.symbol, e),
            }
        }
        info!("Screening done: {} of {} selected", selected.len(), candidates.len());
        selected
    }

    pub fn evaluate(&self, candidate: &Candidate) -> Result<Verdict> {
        let info = &candidate.info;
        if self.config.exclude_suspended && info.suspended {
            return Ok(Verdict::Rejected(RejectReason::Suspended));
        }
        if self.config.exclude_st && is_special_treatment(&info.name) {
            return Ok(Verdict::Rejected(RejectReason::SpecialTreatment));
        }
        if self.config.main_board_only && !is_main_board(&info.symbol) {
            return Ok(Verdict::Rejected(RejectReason::NotMainBoard));
        }
        if info.total_market_value > self.config.max_market_value {
            return Ok(Verdict::Rejected(RejectReason::MarketValueTooLarge));
        }

        let mut daily = candidate.daily.clone();
        daily.sort_by_key(|bar| bar.date);
        if daily.len() < 2 {
            return Ok(Verdict::Rejected(RejectReason::InsufficientHistory));
        }

        let changes = pct_changes(&daily)?;
        let last = daily.len() - 1;

        if !changes[last].is_some_and(|change| change >= self.config.limit_up_threshold) {
            return Ok(Verdict::Rejected(RejectReason::NotLimitUp));
        }
        if self.config.exclude_one_word_board && is_one_word_board(&daily[last], &daily[last - 1]) {
            return Ok(Verdict::Rejected(RejectReason::OneWordBoard));
        }

        let window_start = daily.len().saturating_sub(self.config.first_limit_up_days);
        let earlier_limit_ups = changes[window_start..last]
            .iter()
            .flatten()
            .filter(|change| **change >= self.config.limit_up_threshold)
            .count();
        if earlier_limit_ups > 0 {
            return Ok(Verdict::Rejected(RejectReason::NotFirstLimitUp));
        }

        let high_start = daily.len().saturating_sub(self.config.new_high_days);
        let highest = daily[high_start..]
            .iter()
            .map(|bar| bar.close)
            .max()
            .unwrap_or(daily[last].close);
        if daily[last].close < highest {
            return Ok(Verdict::Rejected(RejectReason::NotNewHigh));
        }

        Ok(Verdict::Selected)
    }
}

fn is_special_treatment(name: &str) -> bool {
    name.contains("ST")
}

/// Opened and closed at one price, or traded on a fraction of the prior volume
fn is_one_word_board(bar: &DailyBar, previous: &DailyBar) -> bool {
    bar.open == bar.close || bar.volume < previous.volume * ONE_WORD_VOLUME_RATIO
}

/// Close-to-close change per bar; the first bar has none
fn pct_changes(daily: &[DailyBar]) -> Result<Vec<Option<Decimal>>> {
    let mut changes = Vec::with_capacity(daily.len());
    changes.push(None);
    for pair in daily.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        if previous.close <= Decimal::ZERO {
            return Err(EngineError::InvalidData(format!(
                "non-positive close on {}",
                previous.date
            )));
        }
        changes.push(Some((current.close - previous.close) / previous.close));
    }
    Ok(changes)
}
