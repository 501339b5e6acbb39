use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Bar granularity.
///
/// Only daily, hourly and 5-minute bars are supported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1d")]
    Daily,
    #[serde(rename = "1h")]
    Hourly,
    #[serde(rename = "5m")]
    FiveMinutes,
}

impl Interval {
    /// Storage / cache-key representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::Hourly => "1h",
            Interval::FiveMinutes => "5m",
        }
    }

    pub fn is_intraday(&self) -> bool {
        !matches!(self, Interval::Daily)
    }

    /// Length of one bar.
    pub fn bar_length(&self) -> Duration {
        match self {
            Interval::Daily => Duration::days(1),
            Interval::Hourly => Duration::hours(1),
            Interval::FiveMinutes => Duration::minutes(5),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" | "daily" | "day" => Ok(Interval::Daily),
            "1h" | "60m" | "60min" | "hourly" => Ok(Interval::Hourly),
            "5m" | "5min" => Ok(Interval::FiveMinutes),
            other => Err(format!("Unknown interval: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_round_trips_through_str() {
        for interval in [Interval::Daily, Interval::Hourly, Interval::FiveMinutes] {
            assert_eq!(interval.as_str().parse::<Interval>().unwrap(), interval);
        }
    }

    #[test]
    fn test_interval_aliases() {
        assert_eq!("daily".parse::<Interval>().unwrap(), Interval::Daily);
        assert_eq!("60min".parse::<Interval>().unwrap(), Interval::Hourly);
        assert_eq!("5MIN".parse::<Interval>().unwrap(), Interval::FiveMinutes);
        assert!("1w".parse::<Interval>().is_err());
    }

    #[test]
    fn test_intraday_flag() {
        assert!(!Interval::Daily.is_intraday());
        assert!(Interval::Hourly.is_intraday());
        assert!(Interval::FiveMinutes.is_intraday());
    }

    #[test]
    fn test_serde_uses_short_names() {
        assert_eq!(serde_json::to_string(&Interval::Hourly).unwrap(), "\"1h\"");
        let parsed: Interval = serde_json::from_str("\"5m\"").unwrap();
        assert_eq!(parsed, Interval::FiveMinutes);
    }
}
