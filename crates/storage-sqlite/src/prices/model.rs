//! Database model for price observations.

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use pricevault_core::errors::Error;
use pricevault_core::prices::{Day, Money, Ohlcv, PricePoint, PriceSource, Ticker};
use pricevault_market_data::Interval;

use crate::errors::StorageError;

/// Database model for price points
#[derive(Queryable, Identifiable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::price_points)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PricePointDB {
    pub id: String,
    pub ticker: String,
    pub bar_interval: String,
    pub day: String,
    pub timestamp: String,
    pub price: String,
    pub currency: String,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub volume: Option<String>,
    pub provider: String,
    pub fetched_at: String,
}

/// Fixed-width RFC 3339 so that text order is chronological order.
pub(crate) fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn format_day(day: Day) -> String {
    day.date().format("%Y-%m-%d").to_string()
}

fn malformed(field: &str, value: &str) -> Error {
    StorageError::MalformedRow(format!("{} = {:?}", field, value)).into()
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, Error> {
    Decimal::from_str(value).map_err(|_| malformed(field, value))
}

fn parse_optional_decimal(field: &str, value: Option<&str>) -> Result<Option<Decimal>, Error> {
    value.map(|v| parse_decimal(field, v)).transpose()
}

fn parse_instant(field: &str, value: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| malformed(field, value))
}

impl From<&PricePoint> for PricePointDB {
    fn from(point: &PricePoint) -> Self {
        let bar = point.ohlcv.as_ref();
        PricePointDB {
            id: point.id(),
            ticker: point.ticker.to_string(),
            bar_interval: point.interval.as_str().to_string(),
            day: format_day(point.day()),
            timestamp: format_instant(point.timestamp),
            price: point.price.amount.to_string(),
            currency: point.price.currency.clone(),
            open: bar.map(|b| b.open.to_string()),
            high: bar.map(|b| b.high.to_string()),
            low: bar.map(|b| b.low.to_string()),
            volume: bar.and_then(|b| b.volume).map(|v| v.to_string()),
            provider: point.provider.clone(),
            fetched_at: format_instant(point.fetched_at),
        }
    }
}

impl TryFrom<PricePointDB> for PricePoint {
    type Error = Error;

    /// Rows come back tagged [`PriceSource::Durable`].
    fn try_from(db: PricePointDB) -> Result<Self, Self::Error> {
        let ticker = Ticker::new(&db.ticker)?;
        let interval = Interval::from_str(&db.bar_interval)
            .map_err(|_| malformed("bar_interval", &db.bar_interval))?;
        let close = parse_decimal("price", &db.price)?;

        let open = parse_optional_decimal("open", db.open.as_deref())?;
        let high = parse_optional_decimal("high", db.high.as_deref())?;
        let low = parse_optional_decimal("low", db.low.as_deref())?;
        let volume = parse_optional_decimal("volume", db.volume.as_deref())?;
        let ohlcv = match (open, high, low) {
            (Some(open), Some(high), Some(low)) => {
                Some(Ohlcv::new(open, high, low, close, volume)?)
            }
            _ => None,
        };

        let session_day = Day::parse(&db.day).ok_or_else(|| malformed("day", &db.day))?;

        Ok(PricePoint {
            ticker,
            price: Money::new(close, db.currency),
            timestamp: parse_instant("timestamp", &db.timestamp)?,
            session_day,
            interval,
            source: PriceSource::Durable,
            ohlcv,
            provider: db.provider,
            fetched_at: parse_instant("fetched_at", &db.fetched_at)?,
        })
    }
}
