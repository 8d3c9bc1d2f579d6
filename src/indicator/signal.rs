//! Histogram pattern detection

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Pattern over the last three histogram values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistogramPattern {
    /// Three negative bars shrinking toward zero
    ShrinkingNegative,
    /// Three positive bars shrinking toward zero
    ShrinkingPositive,
}

impl std::fmt::Display for HistogramPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistogramPattern::ShrinkingNegative => write!(f, "shrinking-negative"),
            HistogramPattern::ShrinkingPositive => write!(f, "shrinking-positive"),
        }
    }
}

fn last_three(values: &[Decimal]) -> Option<(Decimal, Decimal, Decimal)> {
    match values {
        [.., v1, v2, v3] => Some((*v1, *v2, *v3)),
        _ => None,
    }
}

/// All of the last three values `< 0` and `|v1| > |v2| > |v3|`
pub fn is_shrinking_negative(values: &[Decimal]) -> bool {
    let Some((v1, v2, v3)) = last_three(values) else {
        return false;
    };
    let negative = |v: Decimal| v.is_sign_negative() && !v.is_zero();
    negative(v1) && negative(v2) && negative(v3) && v2.abs() < v1.abs() && v3.abs() < v2.abs()
}

/// All of the last three values `> 0` and `v1 > v2 > v3`
pub fn is_shrinking_positive(values: &[Decimal]) -> bool {
    let Some((v1, v2, v3)) = last_three(values) else {
        return false;
    };
    let zero = Decimal::ZERO;
    v1 > zero && v2 > zero && v3 > zero && v2 < v1 && v3 < v2
}

/// Classify the most recent three values; fewer than three never match
pub fn classify(values: &[Decimal]) -> Option<HistogramPattern> {
    if is_shrinking_negative(values) {
        Some(HistogramPattern::ShrinkingNegative)
    } else if is_shrinking_positive(values) {
        Some(HistogramPattern::ShrinkingPositive)
    } else {
        None
    }
}
