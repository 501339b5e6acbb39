//! Alpha Vantage market data provider implementation.
//!
//! This module provides market data from Alpha Vantage API:
//! - Latest quotes via GLOBAL_QUOTE endpoint
//! - Daily bars via TIME_SERIES_DAILY endpoint
//! - Hourly and 5-minute bars via TIME_SERIES_INTRADAY endpoint
//!
//! Note: Alpha Vantage free tier is limited to 5 API calls per minute and
//! 25 per day.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::America::New_York;
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::MarketDataError;
use crate::models::{Interval, Quote};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};
use crate::validation::QuoteValidator;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "ALPHA_VANTAGE";
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Alpha Vantage market data provider.
///
/// Supports US equities at daily, hourly and 5-minute granularity.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    base_url: String,
    validator: QuoteValidator,
}

// ============================================================================
// Response structures for Alpha Vantage API
// ============================================================================

/// Fields every Alpha Vantage payload may carry instead of data.
#[derive(Debug, Default, Deserialize)]
struct ApiNotice {
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

/// GLOBAL_QUOTE response
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(flatten)]
    notice: ApiNotice,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "02. open")]
    open: Option<String>,
    #[serde(rename = "03. high")]
    high: Option<String>,
    #[serde(rename = "04. low")]
    low: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
}

/// TIME_SERIES_DAILY and TIME_SERIES_INTRADAY responses.
///
/// The series key depends on the function ("Time Series (Daily)",
/// "Time Series (5min)", ...), so it is captured by prefix.
#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(flatten)]
    notice: ApiNotice,
    #[serde(flatten)]
    rest: HashMap<String, serde_json::Value>,
}

impl TimeSeriesResponse {
    fn into_series(self) -> Option<HashMap<String, SeriesBar>> {
        self.rest
            .into_iter()
            .find(|(key, _)| key.starts_with("Time Series"))
            .and_then(|(_, value)| serde_json::from_value(value).ok())
    }
}

#[derive(Debug, Deserialize)]
struct SeriesBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

// ============================================================================
// AlphaVantageProvider implementation
// ============================================================================

impl AlphaVantageProvider {
    /// Create a new Alpha Vantage provider with the default 10 s timeout.
    pub fn new(api_key: String) -> Self {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT)
    }

    /// Create a provider whose HTTP requests give up after `timeout`.
    pub fn with_timeout(api_key: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url: BASE_URL.to_string(),
            validator: QuoteValidator::new(),
        }
    }

    /// Point the provider at another host (used against local fakes).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Make a request to the Alpha Vantage API.
    async fn fetch(&self, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("apikey", &self.api_key));

        let url = reqwest::Url::parse_with_params(&self.base_url, &all_params).map_err(|e| {
            MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to build URL: {}", e),
            }
        })?;

        debug!(
            "Alpha Vantage request: {}",
            url.as_str().replace(&self.api_key, "***")
        );

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::Network(e)
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if !status.is_success() {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::ProviderError {
                    provider: PROVIDER_ID.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    /// Check for API-level errors in the response.
    fn check_api_error(notice: &ApiNotice, symbol: &str) -> Result<(), MarketDataError> {
        if let Some(ref msg) = notice.error_message {
            if msg.contains("Invalid API call") || msg.contains("not found") {
                return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
            }
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: msg.clone(),
            });
        }

        // "Note" and "Information" both carry quota notices
        for msg in [&notice.note, &notice.information].into_iter().flatten() {
            if Self::is_frequency_notice(msg) {
                return Err(MarketDataError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                });
            }
            warn!("Alpha Vantage notice: {}", msg);
        }

        Ok(())
    }

    fn is_frequency_notice(msg: &str) -> bool {
        let lower = msg.to_lowercase();
        lower.contains("api call frequency")
            || lower.contains("rate limit")
            || lower.contains("requests per day")
    }

    /// Parse a date string in YYYY-MM-DD format to midnight UTC.
    fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(|dt| Utc.from_local_datetime(&dt).single())
    }

    /// Parse an intraday timestamp. Alpha Vantage reports them in US/Eastern.
    fn parse_intraday(ts: &str) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S")
            .ok()
            .and_then(|dt| New_York.from_local_datetime(&dt).earliest())
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn parse_decimal(s: &str) -> Option<Decimal> {
        Decimal::from_str(s.trim()).ok()
    }

    fn intraday_param(interval: Interval) -> Option<&'static str> {
        match interval {
            Interval::Daily => None,
            Interval::Hourly => Some("60min"),
            Interval::FiveMinutes => Some("5min"),
        }
    }

    fn parse_error(e: serde_json::Error) -> MarketDataError {
        MarketDataError::ProviderError {
            provider: PROVIDER_ID.to_string(),
            message: format!("Failed to parse response: {}", e),
        }
    }

    fn parse_global_quote(text: &str, symbol: &str) -> Result<Quote, MarketDataError> {
        let response: GlobalQuoteResponse =
            serde_json::from_str(text).map_err(Self::parse_error)?;

        Self::check_api_error(&response.notice, symbol)?;

        // Unknown symbols come back as an empty "Global Quote" object
        let quote = response
            .global_quote
            .filter(|q| q.symbol.is_some())
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let close = quote
            .price
            .as_deref()
            .and_then(Self::parse_decimal)
            .ok_or_else(|| MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Missing price in GLOBAL_QUOTE for {}", symbol),
            })?;

        let timestamp = quote
            .latest_trading_day
            .as_deref()
            .and_then(Self::parse_date)
            .unwrap_or_else(Utc::now);

        Ok(Quote {
            timestamp,
            open: quote.open.as_deref().and_then(Self::parse_decimal),
            high: quote.high.as_deref().and_then(Self::parse_decimal),
            low: quote.low.as_deref().and_then(Self::parse_decimal),
            close,
            volume: quote.volume.as_deref().and_then(Self::parse_decimal),
            currency: DEFAULT_CURRENCY.to_string(),
            source: PROVIDER_ID.to_string(),
        })
    }

    fn parse_time_series(
        text: &str,
        symbol: &str,
        interval: Interval,
    ) -> Result<Vec<Quote>, MarketDataError> {
        let response: TimeSeriesResponse =
            serde_json::from_str(text).map_err(Self::parse_error)?;

        Self::check_api_error(&response.notice, symbol)?;

        let series = response
            .into_series()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let mut quotes: Vec<Quote> = series
            .into_iter()
            .filter_map(|(ts, bar)| {
                let timestamp = if interval.is_intraday() {
                    Self::parse_intraday(&ts)?
                } else {
                    Self::parse_date(&ts)?
                };

                Some(Quote::ohlcv(
                    timestamp,
                    Self::parse_decimal(&bar.open)?,
                    Self::parse_decimal(&bar.high)?,
                    Self::parse_decimal(&bar.low)?,
                    Self::parse_decimal(&bar.close)?,
                    Self::parse_decimal(&bar.volume)?,
                    DEFAULT_CURRENCY.to_string(),
                    PROVIDER_ID.to_string(),
                ))
            })
            .collect();

        quotes.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(quotes)
    }

    /// Filter quotes by date range.
    fn filter_by_date_range(
        quotes: Vec<Quote>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Quote> {
        quotes
            .into_iter()
            .filter(|q| q.timestamp >= start && q.timestamp <= end)
            .collect()
    }

    async fn fetch_series(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<Vec<Quote>, MarketDataError> {
        let text = match Self::intraday_param(interval) {
            None => {
                let params = [
                    ("function", "TIME_SERIES_DAILY"),
                    ("symbol", symbol),
                    ("outputsize", "compact"), // TIME_SERIES_DAILY: 'full' is premium-only
                ];
                self.fetch(&params).await?
            }
            Some(av_interval) => {
                let params = [
                    ("function", "TIME_SERIES_INTRADAY"),
                    ("symbol", symbol),
                    ("interval", av_interval),
                    ("outputsize", "compact"),
                ];
                self.fetch(&params).await?
            }
        };

        let quotes = Self::parse_time_series(&text, symbol, interval)?;

        debug!(
            "Alpha Vantage: fetched {} {} quotes for {}",
            quotes.len(),
            interval,
            symbol
        );

        Ok(quotes)
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            intervals: &[Interval::Daily, Interval::Hourly, Interval::FiveMinutes],
            supports_latest: true,
            supports_historical: true,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 5, // Free tier is very limited
            requests_per_day: 25,
            max_concurrency: 1,
        }
    }

    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let params = [("function", "GLOBAL_QUOTE"), ("symbol", symbol)];
        let text = self.fetch(&params).await?;

        let quote = Self::parse_global_quote(&text, symbol)?;
        self.validator.validate(&quote)?;

        Ok(quote)
    }

    async fn get_historical_quotes(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Vec<Quote>, MarketDataError> {
        let quotes = self.fetch_series(symbol, interval).await?;
        let filtered = Self::filter_by_date_range(quotes, start, end);
        let valid = self.validator.retain_valid(symbol, filtered);

        if valid.is_empty() {
            return Err(MarketDataError::NoDataForRange);
        }

        Ok(valid)
    }
}
