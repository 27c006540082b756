//! Cell-level operations used by the enrichment stages.
//!
//! - [`extract_number`] - Pull the first number out of a noisy cell and round it
//! - [`count_codes`] - Count delimited tokens matching a code family (GBD/GBS)
//! - [`matches_any_keyword`] - Test a comma-joined list for keywords (BCY/BYN)
//!
//! [`Operation`] wraps the column-wise transforms so stages and configs can
//! name them declaratively.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::Cell;

/// Signed decimal (tried first) or bare unsigned integer.
static NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?\d*\.\d+|\d+").expect("valid number pattern"));

/// Runs of the code-list delimiters: space, comma, semicolon, slash.
static CODE_DELIMITERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ ,;/]+").expect("valid delimiter pattern"));

/// Default code family counted in the POST "Demand" column.
pub const DEFAULT_CODE_PATTERNS: [&str; 2] = ["GBD", "GBS"];

/// Column-wise transforms applied by the enrichment stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Replace the cell with the first number found, rounded.
    ExtractNumber { decimals: u32 },

    /// Replace the cell with the count of tokens containing any pattern.
    CountCodes {
        #[serde(default = "default_code_patterns")]
        patterns: Vec<String>,
    },
}

fn default_code_patterns() -> Vec<String> {
    DEFAULT_CODE_PATTERNS.iter().map(|s| s.to_string()).collect()
}

impl Operation {
    /// Apply this operation to one cell.
    pub fn apply(&self, cell: &Cell) -> Cell {
        match self {
            Operation::ExtractNumber { decimals } => extract_number(cell, *decimals).into(),
            Operation::CountCodes { patterns } => {
                Cell::Number(count_codes_with(cell, patterns.as_slice()) as f64)
            }
        }
    }
}

// =============================================================================
// Numeric Extractor
// =============================================================================

/// Extract the first number in `cell` and round it to `decimals` digits.
///
/// Returns `None` for an absent cell or when no number is present.
/// Rounding is half away from zero on the number as written, so
/// `"Qty: -12.345 kg"` at 2 decimals gives `-12.35`. Only the decimal
/// alternative carries a sign in text: `"-5 kg"` gives `5`. Numeric cells
/// are rounded as they are.
pub fn extract_number(cell: &Cell, decimals: u32) -> Option<f64> {
    if let Cell::Number(n) = cell {
        return n.is_finite().then(|| round_number_text(&n.to_string(), decimals)).flatten();
    }
    let text = cell.to_text()?;
    let found = NUMBER_PATTERN.find(&text)?;
    round_number_text(found.as_str(), decimals)
}

fn round_number_text(raw: &str, decimals: u32) -> Option<f64> {
    let (negative, digits) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };
    let digits = if digits.starts_with('.') {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };

    match Decimal::from_str(&digits) {
        Ok(mut value) => {
            if negative {
                value.set_sign_negative(true);
            }
            // Via text so the f64 is the nearest one to the rounded decimal.
            value
                .round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
                .to_string()
                .parse::<f64>()
                .ok()
        }
        // Beyond Decimal's 28 digits; fall back to float rounding.
        Err(_) => {
            let value: f64 = digits.parse().ok()?;
            let value = if negative { -value } else { value };
            let factor = 10f64.powi(decimals as i32);
            Some((value * factor).round() / factor)
        }
    }
}

// =============================================================================
// Code Counter
// =============================================================================

/// Count tokens containing "GBD" or "GBS".
pub fn count_codes(cell: &Cell) -> usize {
    count_codes_with(cell, &DEFAULT_CODE_PATTERNS)
}

/// Count delimiter-separated tokens containing any of `patterns`.
///
/// Case-sensitive substring match; a token matching several patterns
/// counts once.
pub fn count_codes_with<P: AsRef<str>>(cell: &Cell, patterns: &[P]) -> usize {
    let Some(text) = cell.to_text() else {
        return 0;
    };
    CODE_DELIMITERS
        .split(&text)
        .filter(|token| !token.is_empty())
        .filter(|token| patterns.iter().any(|p| token.contains(p.as_ref())))
        .count()
}

// =============================================================================
// Keyword Classifier
// =============================================================================

/// True if any comma-separated part of `cell` contains any keyword.
///
/// Parts are trimmed and upper-cased before matching. An absent cell or a
/// cell equal to `sentinel` never matches.
pub fn matches_any_keyword<K: AsRef<str>>(cell: &Cell, keywords: &[K], sentinel: &str) -> bool {
    let Some(text) = cell.to_text() else {
        return false;
    };
    if text == sentinel {
        return false;
    }
    text.split(',')
        .map(|part| part.trim().to_uppercase())
        .any(|part| keywords.iter().any(|k| part.contains(k.as_ref())))
}
