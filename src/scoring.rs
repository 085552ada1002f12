//! Score calculation
//!
//! Pure functions that turn raw per-item ratings into group totals and
//! percentages. Inputs come straight from the form, so every function here
//! tolerates partial or malformed input: a missing, unparseable or negative
//! rating counts as 0 and a rating above [`RATING_MAX`] is clamped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::types::Scores;

/// Highest value a single rating can take
pub const RATING_MAX: u8 = 10;

/// Number of rated items in each group
pub const RATINGS_PER_GROUP: usize = 5;

/// Maximum total of one rating group (administrative or financial)
pub const GROUP_MAX: u32 = RATING_MAX as u32 * RATINGS_PER_GROUP as u32;

/// Maximum overall total; equal to 100 so the total doubles as a percentage
pub const OVERALL_MAX: u32 = GROUP_MAX * 2;

/// Clamp an integer rating into `0..=RATING_MAX`
pub fn clamp_rating(value: i64) -> u8 {
    value.clamp(0, RATING_MAX as i64) as u8
}

/// Coerce a raw form value into a rating
///
/// Numbers and numeric strings are truncated toward zero and clamped.
/// Anything else (null, booleans, empty or non-numeric strings, NaN) is 0.
pub fn coerce_rating(value: &Value) -> u8 {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                clamp_rating(i)
            } else {
                n.as_f64().map(coerce_float).unwrap_or(0)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                clamp_rating(i)
            } else {
                s.parse::<f64>().map(coerce_float).unwrap_or(0)
            }
        }
        _ => 0,
    }
}

fn coerce_float(f: f64) -> u8 {
    if f.is_finite() {
        clamp_rating(f.trunc() as i64)
    } else {
        0
    }
}

/// Sum a group of named ratings
///
/// Missing or invalid entries contribute 0, so an empty map totals 0.
pub fn compute_group_total(ratings: &BTreeMap<String, Value>) -> u32 {
    ratings.values().map(|v| coerce_rating(v) as u32).sum()
}

/// Percentage of `total` against `max`, rounded half up
///
/// A zero `max` yields 0 rather than dividing by zero.
pub fn compute_percentage(total: u32, max: u32) -> u32 {
    if max == 0 {
        return 0;
    }
    let total = total as u64;
    let max = max as u64;
    ((200 * total + max) / (2 * max)) as u32
}

/// Qualitative band for a percentage, used to colour score bars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ScoreBand {
    pub fn from_percent(percent: u32) -> Self {
        match percent {
            p if p >= 80 => ScoreBand::Excellent,
            p if p >= 60 => ScoreBand::Good,
            p if p >= 40 => ScoreBand::Fair,
            _ => ScoreBand::Poor,
        }
    }
}

impl std::fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScoreBand::Excellent => "excellent",
            ScoreBand::Good => "good",
            ScoreBand::Fair => "fair",
            ScoreBand::Poor => "poor",
        };
        write!(f, "{}", s)
    }
}

/// Totals and percentages shown in the live summary panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub administrative: u32,
    pub financial: u32,
    pub total: u32,
    pub administrative_percent: u32,
    pub financial_percent: u32,
    pub total_percent: u32,
}

impl ScoreSummary {
    /// Band of the overall percentage
    pub fn band(&self) -> ScoreBand {
        ScoreBand::from_percent(self.total_percent)
    }
}

impl From<Scores> for ScoreSummary {
    fn from(scores: Scores) -> Self {
        Self {
            administrative: scores.administrative,
            financial: scores.financial,
            total: scores.total,
            administrative_percent: compute_percentage(scores.administrative, GROUP_MAX),
            financial_percent: compute_percentage(scores.financial, GROUP_MAX),
            total_percent: compute_percentage(scores.total, OVERALL_MAX),
        }
    }
}
