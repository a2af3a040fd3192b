//! Shared types for the NEWSWATCH service.
//!
//! These types form the data model used across all modules: calendar
//! records coming out of the scraper, the focus selection the user pins,
//! trade directions and audit entries, plus the domain error taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder the calendar shows for a value that is not published yet.
pub const EMPTY_VALUE: &str = "—";

// ---------------------------------------------------------------------------
// Release records
// ---------------------------------------------------------------------------

/// One row of the economic calendar, produced fresh on every scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub time: String,
    pub event_name: String,
    pub currency_code: String,
    /// Number of importance bulls, 0–3.
    pub importance: u8,
    /// Published value, or [`EMPTY_VALUE`].
    pub actual_value: String,
    pub actual_polarity: Polarity,
    pub forecast_value: String,
    pub forecast_polarity: Polarity,
    pub previous_value: String,
    pub previous_polarity: Polarity,
}

impl ReleaseRecord {
    /// Identity of the release (a record has no identity beyond this).
    pub fn key(&self) -> ReleaseKey {
        ReleaseKey::new(&self.event_name, &self.currency_code)
    }

    /// Whether the release already carries a published value.
    pub fn has_fact(&self) -> bool {
        let v = self.actual_value.trim();
        !v.is_empty() && v != EMPTY_VALUE
    }

    /// Fingerprint of the current fact: `"<actual>-<polarity code>"`.
    pub fn fact_key(&self) -> String {
        format!("{}-{}", self.actual_value, self.actual_polarity)
    }

    /// Key under which an acted-upon fact is remembered.
    pub fn fact_id(&self) -> FactId {
        FactId {
            event_name: self.event_name.clone(),
            currency_code: self.currency_code.clone(),
            actual_value: self.actual_value.clone(),
        }
    }

    /// Helper to build a test record with sensible defaults.
    #[cfg(test)]
    pub fn sample(event: &str, currency: &str, actual: &str, polarity: Polarity) -> Self {
        Self {
            time: "15:30".to_string(),
            event_name: event.to_string(),
            currency_code: currency.to_string(),
            importance: 3,
            actual_value: actual.to_string(),
            actual_polarity: polarity,
            forecast_value: "0.3%".to_string(),
            forecast_polarity: Polarity::NoData,
            previous_value: "0.2%".to_string(),
            previous_polarity: Polarity::NoData,
        }
    }
}

impl fmt::Display for ReleaseRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {}] {} actual={} ({}) forecast={} previous={}",
            self.time,
            self.currency_code,
            self.event_name,
            self.actual_value,
            self.actual_polarity,
            self.forecast_value,
            self.previous_value,
        )
    }
}

/// Identity of a release: `(event name, currency code)`.
///
/// Also used as the user's focus selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReleaseKey {
    pub event_name: String,
    pub currency_code: String,
}

/// The single release the watch tracks.
pub type FocusSelection = ReleaseKey;

impl ReleaseKey {
    pub fn new(event_name: &str, currency_code: &str) -> Self {
        Self {
            event_name: event_name.to_string(),
            currency_code: currency_code.to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.event_name.trim().is_empty() || self.currency_code.trim().is_empty()
    }
}

impl fmt::Display for ReleaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.event_name, self.currency_code)
    }
}

/// A release fact that has been acted upon: `(event, currency, actual)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactId {
    pub event_name: String,
    pub currency_code: String,
    pub actual_value: String,
}

impl fmt::Display for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.event_name, self.currency_code, self.actual_value)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Classification of a published value against expectations, taken from
/// the calendar's colour cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
    #[default]
    NoData,
}

impl Polarity {
    /// Derive polarity from a value cell's CSS classes.
    pub fn from_classes<S: AsRef<str>>(classes: &[S]) -> Self {
        let has = |name: &str| classes.iter().any(|c| c.as_ref() == name);
        if has("greenFont") {
            Polarity::Positive
        } else if has("redFont") {
            Polarity::Negative
        } else if has("blackFont") {
            Polarity::Neutral
        } else {
            Polarity::NoData
        }
    }

    /// Short code used in fact fingerprints.
    pub fn code(&self) -> &'static str {
        match self {
            Polarity::Positive => "GFP",
            Polarity::Negative => "RFP",
            Polarity::Neutral => "BFP",
            Polarity::NoData => "NFP",
        }
    }

    /// Only positive and negative facts carry a tradable signal.
    pub fn is_directional(&self) -> bool {
        matches!(self, Polarity::Positive | Polarity::Negative)
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Polarity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gfp" | "positive" | "green" => Ok(Polarity::Positive),
            "rfp" | "negative" | "red" => Ok(Polarity::Negative),
            "bfp" | "neutral" | "black" => Ok(Polarity::Neutral),
            "nfp" | "nodata" | "none" => Ok(Polarity::NoData),
            _ => Err(anyhow::anyhow!("Unknown polarity: {s}")),
        }
    }
}

/// Trade direction resolved from the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "buy"),
            Direction::Sell => write!(f, "sell"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" | "call" => Ok(Direction::Buy),
            "sell" | "put" => Ok(Direction::Sell),
            _ => Err(anyhow::anyhow!("Unknown direction: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Audit log
// ---------------------------------------------------------------------------

/// One executed automated click, appended to the persisted trade history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub asset: String,
    pub pair: String,
    pub event_name: String,
    pub actual_value: String,
    pub polarity: Polarity,
    pub broker_tab_id: i64,
    pub broker_url: String,
}

impl fmt::Display for TradeLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}/{} on '{}' ({} {})",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.direction,
            self.asset,
            self.pair,
            self.event_name,
            self.actual_value,
            self.polarity,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for NEWSWATCH.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
