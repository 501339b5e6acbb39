//! Strong types for the price engine.
//!
//! These types enforce clear boundaries and prevent mixing of concepts:
//! - `Ticker` - Normalised exchange symbol
//! - `Day` - Date bucket for cache keys and daily observations
//! - `CacheKey` - (ticker, interval, day) composite key

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use pricevault_market_data::Interval;

use crate::errors::{Error, ValidationError};

// =============================================================================
// Ticker
// =============================================================================

/// Exchange symbol, upper-cased and trimmed.
///
/// Examples: "AAPL", "BRK.B"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    pub fn new(symbol: impl AsRef<str>) -> Result<Self, Error> {
        let normalised = symbol.as_ref().trim().to_uppercase();
        if normalised.is_empty() {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Ticker must not be empty".to_string(),
            )));
        }
        if normalised.chars().any(|c| c.is_whitespace() || c == ':') {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Ticker '{}' contains invalid characters",
                normalised
            ))));
        }
        Ok(Self(normalised))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ticker {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Ticker> for String {
    fn from(ticker: Ticker) -> Self {
        ticker.0
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Day
// =============================================================================

/// Calendar date bucket.
///
/// Daily observations and cache keys are bucketed by `Day`, formatted
/// "YYYY-MM-DD".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Day(pub NaiveDate);

impl Day {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Creates a Day from year, month, day components.
    /// Returns None if the date is invalid.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Parses a day from "YYYY-MM-DD" format.
    pub fn parse(s: &str) -> Option<Self> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Self)
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl From<NaiveDate> for Day {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl From<Day> for NaiveDate {
    fn from(day: Day) -> Self {
        day.0
    }
}

// =============================================================================
// CacheKey
// =============================================================================

/// Composite key of one day's observations.
///
/// Keys are always per day, never per requested range, so overlapping
/// requests share entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub ticker: Ticker,
    pub interval: Interval,
    pub day: Day,
}

impl CacheKey {
    pub const PREFIX: &'static str = "price";

    pub fn new(ticker: Ticker, interval: Interval, day: Day) -> Self {
        Self {
            ticker,
            interval,
            day,
        }
    }

    /// Parses the rendered form back into a key.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.splitn(4, ':');
        if parts.next()? != Self::PREFIX {
            return None;
        }
        let ticker = Ticker::new(parts.next()?).ok()?;
        let interval = parts.next()?.parse::<Interval>().ok()?;
        let day = Day::parse(parts.next()?)?;
        Some(Self::new(ticker, interval, day))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            Self::PREFIX,
            self.ticker,
            self.interval,
            self.day
        )
    }
}
