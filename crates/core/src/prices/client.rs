//! Upstream client facade.
//!
//! Wraps the market-data provider with the engine's concurrency cap and call
//! timeout, and converts provider quotes into [`PricePoint`]s.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use chrono_tz::Tz;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use pricevault_market_data::errors::MarketDataError;
use pricevault_market_data::{Interval, MarketDataProvider, Quote};

use super::constants::DEFAULT_CURRENCY;
use super::model::{session_day, Money, Ohlcv, PricePoint, PriceSource};
use super::types::{Day, Ticker};
use crate::utils::time_utils::{start_of_day_utc, start_of_market_day_utc};

/// Converts a provider quote into a price point.
///
/// OHLC is attached only when complete and consistent.
pub fn quote_to_point(
    ticker: &Ticker,
    quote: Quote,
    interval: Interval,
    timestamp: DateTime<Utc>,
    session_day: Day,
    fetched_at: DateTime<Utc>,
) -> PricePoint {
    let ohlcv = match (quote.open, quote.high, quote.low) {
        (Some(open), Some(high), Some(low)) => {
            match Ohlcv::new(open, high, low, quote.close, quote.volume) {
                Ok(bar) => Some(bar),
                Err(e) => {
                    warn!("Dropping inconsistent OHLC for {} at {}: {}", ticker, timestamp, e);
                    None
                }
            }
        }
        _ => None,
    };

    let currency = if quote.currency.is_empty() {
        DEFAULT_CURRENCY.to_string()
    } else {
        quote.currency
    };

    PricePoint {
        ticker: ticker.clone(),
        price: Money::new(quote.close, currency),
        timestamp,
        session_day,
        interval,
        source: PriceSource::Upstream,
        ohlcv,
        provider: quote.source,
        fetched_at,
    }
}

/// Bounded, time-limited access to the upstream provider.
pub struct UpstreamClient {
    provider: Arc<dyn MarketDataProvider>,
    permits: Arc<Semaphore>,
    timeout: Duration,
    market_tz: Tz,
}

impl UpstreamClient {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        max_in_flight: usize,
        timeout: Duration,
        market_tz: Tz,
    ) -> Self {
        Self {
            provider,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            timeout,
            market_tz,
        }
    }

    /// Latest quote, bucketed under `today` (midnight UTC) and stamped `now`.
    pub async fn latest(
        &self,
        ticker: &Ticker,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<PricePoint, MarketDataError> {
        let _permit = self.acquire().await?;

        let quote = tokio::time::timeout(self.timeout, self.provider.get_latest_quote(ticker.as_str()))
            .await
            .map_err(|_| self.timed_out())??;

        info!(
            "Fetched latest quote for {} from {}: {}",
            ticker, quote.source, quote.close
        );
        Ok(quote_to_point(
            ticker,
            quote,
            Interval::Daily,
            start_of_day_utc(today),
            Day(today),
            now,
        ))
    }

    /// Bars whose session lies in `[start, end]`, chronological.
    ///
    /// Intraday windows follow the market day so that pre-market and
    /// after-hours bars are requested with their session.
    pub async fn history(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
        now: DateTime<Utc>,
    ) -> Result<Vec<PricePoint>, MarketDataError> {
        let _permit = self.acquire().await?;

        let next = end + ChronoDuration::days(1);
        let (window_start, window_end) = if interval.is_intraday() {
            (
                start_of_market_day_utc(start, self.market_tz),
                start_of_market_day_utc(next, self.market_tz) - ChronoDuration::seconds(1),
            )
        } else {
            (
                start_of_day_utc(start),
                start_of_day_utc(next) - ChronoDuration::seconds(1),
            )
        };

        let quotes = tokio::time::timeout(
            self.timeout,
            self.provider
                .get_historical_quotes(ticker.as_str(), window_start, window_end, interval),
        )
        .await
        .map_err(|_| self.timed_out())??;

        info!(
            "Fetched {} {} bars for {} ({}..{})",
            quotes.len(),
            interval,
            ticker,
            start,
            end
        );

        let points = quotes
            .into_iter()
            .map(|q| {
                let timestamp = q.timestamp;
                let session = session_day(timestamp, interval, self.market_tz);
                quote_to_point(ticker, q, interval, timestamp, session, now)
            })
            .collect();
        Ok(points)
    }

    async fn acquire(&self) -> Result<tokio::sync::SemaphorePermit<'_>, MarketDataError> {
        if self.permits.available_permits() == 0 {
            debug!("Upstream concurrency cap reached, waiting for a slot");
        }
        self.permits
            .acquire()
            .await
            .map_err(|e| MarketDataError::ProviderError {
                provider: self.provider.id().to_string(),
                message: e.to_string(),
            })
    }

    fn timed_out(&self) -> MarketDataError {
        warn!(
            "Upstream call to {} exceeded {:?}",
            self.provider.id(),
            self.timeout
        );
        MarketDataError::Timeout {
            provider: self.provider.id().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_to_point_keeps_consistent_ohlc() {
        let ticker = Ticker::new("IBM").unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 1, 12, 0, 0, 0).unwrap();
        let quote = Quote::ohlcv(
            ts,
            dec!(162),
            dec!(166),
            dec!(161),
            dec!(165),
            dec!(1000),
            "USD".to_string(),
            "ALPHA_VANTAGE".to_string(),
        );

        let point = quote_to_point(&ticker, quote, Interval::Daily, ts, Day(ts.date_naive()), ts);
        assert_eq!(point.price, Money::new(dec!(165), "USD"));
        assert_eq!(point.provider, "ALPHA_VANTAGE");
        assert_eq!(point.source, PriceSource::Upstream);
        assert_eq!(point.ohlcv.unwrap().volume, Some(dec!(1000)));
    }

    #[test]
    fn test_quote_to_point_drops_inconsistent_ohlc() {
        let ticker = Ticker::new("IBM").unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 1, 12, 0, 0, 0).unwrap();
        let quote = Quote::ohlcv(
            ts,
            dec!(162),
            dec!(160),
            dec!(161),
            dec!(165),
            dec!(1000),
            String::new(),
            "ALPHA_VANTAGE".to_string(),
        );

        let point = quote_to_point(&ticker, quote, Interval::Daily, ts, Day(ts.date_naive()), ts);
        assert!(point.ohlcv.is_none());
        assert_eq!(point.price.currency, "USD");
    }
}
