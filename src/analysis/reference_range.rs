//! Reference range parsing and abnormal-value flags.
//!
//! Ranges are free text typed by lab staff, so parsing is best effort: a
//! range or result we cannot read simply produces no flag.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static BETWEEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([-+]?\d+(?:\.\d+)?)\s*[-–]\s*([-+]?\d+(?:\.\d+)?)")
        .expect("valid between-range regex")
});

static BELOW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:<=|<|≤)\s*([-+]?\d+(?:\.\d+)?)").expect("valid below-range regex")
});

static ABOVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:>=|>|≥)\s*([-+]?\d+(?:\.\d+)?)").expect("valid above-range regex")
});

/// Direction of an out-of-range result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AbnormalFlag {
    Low,
    High,
}

impl fmt::Display for AbnormalFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbnormalFlag::Low => write!(f, "LOW"),
            AbnormalFlag::High => write!(f, "HIGH"),
        }
    }
}

/// A parsed reference range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReferenceRange {
    /// `low - high`
    Between { low: f64, high: f64 },
    /// `< max`
    Below { max: f64 },
    /// `> min`
    Above { min: f64 },
}

impl ReferenceRange {
    /// Parse a range string. Bounds may be signed; text after the numbers
    /// (units, notes) is ignored.
    pub fn parse(text: &str) -> Option<Self> {
        if let Some(caps) = BELOW_RE.captures(text) {
            return Some(ReferenceRange::Below {
                max: caps[1].parse().ok()?,
            });
        }
        if let Some(caps) = ABOVE_RE.captures(text) {
            return Some(ReferenceRange::Above {
                min: caps[1].parse().ok()?,
            });
        }
        let caps = BETWEEN_RE.captures(text)?;
        Some(ReferenceRange::Between {
            low: caps[1].parse().ok()?,
            high: caps[2].parse().ok()?,
        })
    }

    /// Flag `value` against this range.
    pub fn classify(&self, value: f64) -> Option<AbnormalFlag> {
        match *self {
            ReferenceRange::Between { low, .. } if value < low => Some(AbnormalFlag::Low),
            ReferenceRange::Between { high, .. } if value > high => Some(AbnormalFlag::High),
            ReferenceRange::Below { max } if value > max => Some(AbnormalFlag::High),
            ReferenceRange::Above { min } if value < min => Some(AbnormalFlag::Low),
            _ => None,
        }
    }
}

/// Parse a numeric result value.
fn parse_result(result: &str) -> Option<f64> {
    result.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Flag `result` against `range`, or `None` when either cannot be read.
pub fn evaluate(range: Option<&str>, result: &str) -> Option<AbnormalFlag> {
    let range = ReferenceRange::parse(range?)?;
    range.classify(parse_result(result)?)
}
