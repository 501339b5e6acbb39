//! Domain models for price observations.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use pricevault_market_data::Interval;

use super::types::{CacheKey, Day, Ticker};
use crate::errors::{Error, Result, ValidationError};
use crate::utils::time_utils::market_date_from_utc;

/// An amount in a currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// One bar. `low <= open, close <= high`, all non-negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ohlcv {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,
}

impl Ohlcv {
    pub fn new(
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Option<Decimal>,
    ) -> Result<Self> {
        let bar = Self {
            open,
            high,
            low,
            close,
            volume,
        };
        bar.validate()?;
        Ok(bar)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::Validation(ValidationError::InvalidInput(msg)));

        if self.low < Decimal::ZERO {
            return invalid(format!("Negative low price: {}", self.low));
        }
        if self.low > self.high {
            return invalid(format!(
                "High ({}) is less than Low ({})",
                self.high, self.low
            ));
        }
        for (label, value) in [("Open", self.open), ("Close", self.close)] {
            if value < self.low || value > self.high {
                return invalid(format!(
                    "{} ({}) is outside High/Low range ({}-{})",
                    label, value, self.low, self.high
                ));
            }
        }
        if self.volume.is_some_and(|v| v < Decimal::ZERO) {
            return invalid("Negative volume".to_string());
        }
        Ok(())
    }
}

/// Where a returned observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceSource {
    /// Fast cache tier, fresh.
    Cache,
    /// Durable store, fresh.
    Durable,
    /// Fetched from the provider during this request.
    Upstream,
    /// Served past its freshness threshold because nothing fresher was obtainable.
    Stale,
    /// The market is closed today; this is the last trading day's price.
    LastTradingDay,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSource::Cache => "CACHE",
            PriceSource::Durable => "DURABLE",
            PriceSource::Upstream => "UPSTREAM",
            PriceSource::Stale => "STALE",
            PriceSource::LastTradingDay => "LAST_TRADING_DAY",
        }
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trading session an observation at `timestamp` belongs to.
///
/// Daily bars sit at midnight UTC of their session. Intraday bars take the
/// market date of their timestamp, so extended-hours bars printed after the
/// UTC rollover stay with their session.
pub fn session_day(timestamp: DateTime<Utc>, interval: Interval, market_tz: Tz) -> Day {
    if interval.is_intraday() {
        Day(market_date_from_utc(timestamp, market_tz))
    } else {
        Day(timestamp.date_naive())
    }
}

/// A single price observation.
///
/// Timestamps are UTC. Daily observations sit at midnight UTC of their day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub ticker: Ticker,
    pub price: Money,
    pub timestamp: DateTime<Utc>,
    /// Session bucket; see [`session_day`].
    pub session_day: Day,
    pub interval: Interval,
    pub source: PriceSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ohlcv: Option<Ohlcv>,
    /// Upstream provider that produced the observation.
    pub provider: String,
    /// When the observation was obtained upstream; drives freshness.
    pub fetched_at: DateTime<Utc>,
}

impl PricePoint {
    /// The cache bucket this observation belongs to.
    pub fn day(&self) -> Day {
        self.session_day
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.ticker.clone(), self.interval, self.day())
    }

    /// A copy re-tagged with `source`.
    pub fn with_source(&self, source: PriceSource) -> Self {
        Self {
            source,
            ..self.clone()
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.fetched_at
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        self.age(now) < max_age
    }

    /// Durable identity: one row per (ticker, interval, timestamp, provider).
    pub fn id(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.ticker,
            self.interval,
            self.timestamp.format("%Y%m%dT%H%M%SZ"),
            self.provider
        )
    }
}
