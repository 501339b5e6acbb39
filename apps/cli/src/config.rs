//! Environment configuration.
//!
//! Values come from the process environment, after loading a `.env` file from
//! the working directory when one exists.

use chrono_tz::Tz;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use pricevault_core::rate_limit::{DEFAULT_REQUESTS_PER_DAY, DEFAULT_REQUESTS_PER_MINUTE};
use pricevault_core::utils::time_utils::DEFAULT_MARKET_TZ;

pub const DEFAULT_DB_PATH: &str = "./data/pricevault.db";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is not set")]
    Missing { key: &'static str },

    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected text or json, got {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub alpha_vantage_api_key: Option<String>,
    pub requests_per_minute: u32,
    pub requests_per_day: u32,
    pub market_tz: Tz,
    pub upstream_timeout: Duration,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; the process environment still applies.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            db_path: get("PV_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            alpha_vantage_api_key: get("PV_ALPHA_VANTAGE_API_KEY"),
            requests_per_minute: parse_positive(
                "PV_REQUESTS_PER_MINUTE",
                get("PV_REQUESTS_PER_MINUTE"),
                DEFAULT_REQUESTS_PER_MINUTE,
            )?,
            requests_per_day: parse_positive(
                "PV_REQUESTS_PER_DAY",
                get("PV_REQUESTS_PER_DAY"),
                DEFAULT_REQUESTS_PER_DAY,
            )?,
            market_tz: parse_or("PV_MARKET_TZ", get("PV_MARKET_TZ"), DEFAULT_MARKET_TZ)?,
            upstream_timeout: Duration::from_secs(parse_positive(
                "PV_UPSTREAM_TIMEOUT_SECS",
                get("PV_UPSTREAM_TIMEOUT_SECS"),
                DEFAULT_UPSTREAM_TIMEOUT_SECS,
            )?),
            log_format: parse_or("PV_LOG_FORMAT", get("PV_LOG_FORMAT"), LogFormat::Text)?,
        })
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.alpha_vantage_api_key
            .as_deref()
            .ok_or(ConfigError::Missing {
                key: "PV_ALPHA_VANTAGE_API_KEY",
            })
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_positive<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value = parse_or(key, raw.clone(), default)?;
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: raw.unwrap_or_default(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.db_path, DEFAULT_DB_PATH);
        assert_eq!(config.requests_per_minute, 5);
        assert_eq!(config.requests_per_day, 25);
        assert_eq!(config.market_tz, chrono_tz::America::New_York);
        assert_eq!(config.upstream_timeout, Duration::from_secs(15));
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("PV_DB_PATH", "/var/lib/pv/prices.db"),
            ("PV_ALPHA_VANTAGE_API_KEY", "demo"),
            ("PV_REQUESTS_PER_MINUTE", "75"),
            ("PV_REQUESTS_PER_DAY", "1000"),
            ("PV_MARKET_TZ", "Europe/London"),
            ("PV_UPSTREAM_TIMEOUT_SECS", "30"),
            ("PV_LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert_eq!(config.db_path, "/var/lib/pv/prices.db");
        assert_eq!(config.require_api_key().unwrap(), "demo");
        assert_eq!(config.requests_per_minute, 75);
        assert_eq!(config.requests_per_day, 1000);
        assert_eq!(config.market_tz, chrono_tz::Europe::London);
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values_name_the_key() {
        let err = config(&[("PV_REQUESTS_PER_MINUTE", "five")]).unwrap_err();
        assert!(err.to_string().starts_with("PV_REQUESTS_PER_MINUTE"));

        let err = config(&[("PV_REQUESTS_PER_DAY", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PV_REQUESTS_PER_DAY", .. }));

        assert!(config(&[("PV_MARKET_TZ", "Mars/Olympus")]).is_err());
        assert!(config(&[("PV_LOG_FORMAT", "yaml")]).is_err());
    }
}
