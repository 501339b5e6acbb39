//! Bar sanity checks applied before provider data leaves this crate.
//!
//! A bar is rejected when any of these hold:
//! - a negative close, open, high, low or volume
//! - high below low
//! - open or close outside `[low, high]` (only on a complete OHLC set)

use log::warn;
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::Quote;

#[derive(Clone, Copy, Debug, Default)]
pub struct QuoteValidator;

impl QuoteValidator {
    pub fn new() -> Self {
        Self
    }

    /// `ValidationFailed` listing every violated rule.
    pub fn validate(&self, quote: &Quote) -> Result<(), MarketDataError> {
        let problems = Self::problems(quote);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(MarketDataError::ValidationFailed {
                message: problems.join("; "),
            })
        }
    }

    /// Keep the valid quotes, logging and dropping the rest.
    pub fn retain_valid(&self, symbol: &str, quotes: Vec<Quote>) -> Vec<Quote> {
        quotes
            .into_iter()
            .filter(|quote| match self.validate(quote) {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        "Dropping invalid quote for {} at {}: {}",
                        symbol, quote.timestamp, e
                    );
                    false
                }
            })
            .collect()
    }

    fn problems(quote: &Quote) -> Vec<String> {
        let mut problems = Vec::new();

        let fields = [
            ("close", Some(quote.close)),
            ("open", quote.open),
            ("high", quote.high),
            ("low", quote.low),
            ("volume", quote.volume),
        ];
        for (label, value) in fields {
            if let Some(v) = value.filter(|v| *v < Decimal::ZERO) {
                problems.push(format!("Negative {}: {}", label, v));
            }
        }

        if let (Some(high), Some(low)) = (quote.high, quote.low) {
            if high < low {
                problems.push(format!("High ({}) is less than Low ({})", high, low));
            } else {
                let within = |v: Decimal| v >= low && v <= high;
                if let Some(open) = quote.open.filter(|o| !within(*o)) {
                    problems.push(format!("Open ({}) is outside {}-{}", open, low, high));
                }
                if quote.open.is_some() && !within(quote.close) {
                    problems.push(format!("Close ({}) is outside {}-{}", quote.close, low, high));
                }
            }
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn bar(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Quote {
        Quote {
            timestamp: Utc::now(),
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close,
            volume: Some(dec!(1000)),
            currency: "USD".to_string(),
            source: "TEST".to_string(),
        }
    }

    fn message(quote: &Quote) -> String {
        match QuoteValidator::new().validate(quote) {
            Err(MarketDataError::ValidationFailed { message }) => message,
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_consistent_bar_and_close_only_quote_pass() {
        let validator = QuoteValidator::new();
        assert!(validator.validate(&bar(dec!(100), dec!(105), dec!(95), dec!(101))).is_ok());
        let close_only = Quote::new(Utc::now(), dec!(100), "USD".to_string(), "TEST".to_string());
        assert!(validator.validate(&close_only).is_ok());
    }

    #[test]
    fn test_negative_values_rejected() {
        assert!(message(&bar(dec!(-10), dec!(-5), dec!(-20), dec!(-10))).contains("Negative close"));

        let mut quote = bar(dec!(100), dec!(105), dec!(95), dec!(101));
        quote.volume = Some(dec!(-1));
        assert!(message(&quote).contains("Negative volume"));
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(message(&bar(dec!(92), dec!(90), dec!(95), dec!(92))).contains("less than Low"));
    }

    #[test]
    fn test_open_or_close_outside_range_rejected() {
        assert!(message(&bar(dec!(90), dec!(105), dec!(95), dec!(100))).contains("Open"));
        assert!(message(&bar(dec!(100), dec!(105), dec!(95), dec!(120))).contains("Close"));
    }

    #[test]
    fn test_partial_bar_only_checks_high_and_low() {
        let quote = Quote {
            low: None,
            ..bar(dec!(100), dec!(110), dec!(95), dec!(130))
        };
        assert!(QuoteValidator::new().validate(&quote).is_ok());
    }

    #[test]
    fn test_retain_valid_drops_invalid() {
        let kept = QuoteValidator::new().retain_valid(
            "AAPL",
            vec![
                bar(dec!(100), dec!(105), dec!(95), dec!(101)),
                bar(dec!(100), dec!(105), dec!(95), dec!(-1)),
            ],
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].close, dec!(101));
    }
}
