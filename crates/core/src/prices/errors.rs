//! Caller-facing error taxonomy of the price service.

use chrono::NaiveDate;
use thiserror::Error;

use super::types::Ticker;

/// Why a price request could not be served.
///
/// Transient upstream failures and an exhausted budget are recovered locally
/// by serving stale data; these errors only surface when no tier holds
/// anything usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The provider does not know the symbol and nothing is cached for it.
    #[error("Ticker not found: {0}")]
    TickerNotFound(Ticker),

    /// No usable data: closed market without a fallback, or a transient
    /// failure with nothing cached.
    #[error("Price data unavailable for {ticker}: {reason}")]
    DataUnavailable { ticker: Ticker, reason: String },

    /// The request budget is spent and nothing is cached.
    #[error("Rate budget exhausted for {0}; no cached price available")]
    RateBudgetExhausted(Ticker),

    /// The request itself is malformed.
    #[error("Invalid price request: {0}")]
    InvalidRequest(String),
}

impl PriceError {
    pub fn unavailable(ticker: &Ticker, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            ticker: ticker.clone(),
            reason: reason.into(),
        }
    }

    pub fn invalid_range(start: NaiveDate, end: NaiveDate) -> Self {
        Self::InvalidRequest(format!("start {} is after end {}", start, end))
    }

    /// True when an aggregate caller should skip the holding rather than abort.
    pub fn is_partial_failure(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_classification() {
        let ticker = Ticker::new("AAPL").unwrap();
        assert!(PriceError::TickerNotFound(ticker.clone()).is_partial_failure());
        assert!(PriceError::RateBudgetExhausted(ticker.clone()).is_partial_failure());
        assert!(PriceError::unavailable(&ticker, "market closed").is_partial_failure());
        assert!(!PriceError::InvalidRequest("bad".to_string()).is_partial_failure());
    }

    #[test]
    fn test_error_display() {
        let ticker = Ticker::new("AAPL").unwrap();
        assert_eq!(
            PriceError::unavailable(&ticker, "market closed").to_string(),
            "Price data unavailable for AAPL: market closed"
        );
        let start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(
            PriceError::invalid_range(start, end).to_string(),
            "Invalid price request: start 2024-02-01 is after end 2024-01-01"
        );
    }
}
