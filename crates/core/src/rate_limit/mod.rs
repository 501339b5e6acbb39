//! Dual-quota rate limiter for the upstream provider.
//!
//! A call is permitted only while both the rolling 60-second window and the
//! calendar-day counter (in the reference timezone) have headroom. Counters
//! live behind [`BudgetStore`] so that several engine instances can share one
//! budget. A failing store denies the call.

mod store;

pub use store::{
    minute_window, BudgetRequest, BudgetStore, InMemoryBudgetStore, MINUTE_WINDOW_SECS,
};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{Error, Result};
use crate::utils::time_utils::{market_date_from_utc, next_midnight_utc, DEFAULT_MARKET_TZ};
use crate::utils::Clock;

/// Default per-minute quota (Alpha Vantage free tier).
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 5;

/// Default per-day quota (Alpha Vantage free tier).
pub const DEFAULT_REQUESTS_PER_DAY: u32 = 25;

/// Snapshot of the budget at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateBudget {
    pub calls_this_minute: u32,
    pub calls_today: u32,
    /// Calendar day the daily counter belongs to.
    pub day: NaiveDate,
    pub oldest_call_in_window: Option<DateTime<Utc>>,
}

/// Rate limiter configuration.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub requests_per_day: u32,
    /// Timezone whose midnight resets the daily quota.
    pub timezone: Tz,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            requests_per_day: DEFAULT_REQUESTS_PER_DAY,
            timezone: DEFAULT_MARKET_TZ,
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.requests_per_minute == 0 {
            return Err(Error::InvalidConfigValue(
                "requests_per_minute must be at least 1".to_string(),
            ));
        }
        if self.requests_per_day == 0 {
            return Err(Error::InvalidConfigValue(
                "requests_per_day must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Gatekeeper for upstream calls.
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn BudgetStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(
        config: RateLimitConfig,
        store: Arc<dyn BudgetStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            clock,
        })
    }

    /// In-process limiter over an [`InMemoryBudgetStore`].
    pub fn in_memory(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::new(config, Arc::new(InMemoryBudgetStore::new()), clock)
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        market_date_from_utc(now, self.config.timezone)
    }

    /// Whether a call would be permitted right now. Consumes nothing.
    pub async fn can_make_request(&self) -> bool {
        match self.budget().await {
            Ok(budget) => {
                budget.calls_this_minute < self.config.requests_per_minute
                    && budget.calls_today < self.config.requests_per_day
            }
            Err(e) => {
                warn!("Rate budget unavailable, denying request: {}", e);
                false
            }
        }
    }

    /// Record one call if both quotas allow it.
    ///
    /// Returns false, leaving the counters untouched, when either quota is spent
    /// or the store cannot be reached.
    pub async fn consume_token(&self) -> bool {
        let now = self.clock.now();
        let request = BudgetRequest {
            now,
            day: self.today(now),
            requests_per_minute: self.config.requests_per_minute,
            requests_per_day: self.config.requests_per_day,
        };

        match self.store.try_consume(&request).await {
            Ok(true) => {
                debug!("Rate limiter: token consumed at {}", now);
                true
            }
            Ok(false) => {
                debug!("Rate limiter: budget exhausted at {}", now);
                false
            }
            Err(e) => {
                warn!("Rate budget store failed, denying request: {}", e);
                false
            }
        }
    }

    /// Zero when a call is permitted now, else the wait until one will be.
    ///
    /// When both quotas are spent the longer wait wins.
    pub async fn time_until_available(&self) -> Duration {
        let now = self.clock.now();
        let budget = match self.budget_at(now).await {
            Ok(budget) => budget,
            Err(e) => {
                warn!("Rate budget unavailable: {}", e);
                return Duration::from_secs(MINUTE_WINDOW_SECS as u64);
            }
        };

        let mut wait = chrono::Duration::zero();

        if budget.calls_this_minute >= self.config.requests_per_minute {
            let until_slot = budget
                .oldest_call_in_window
                .map(|oldest| oldest + minute_window() - now)
                .unwrap_or_else(minute_window);
            wait = wait.max(until_slot);
        }

        if budget.calls_today >= self.config.requests_per_day {
            wait = wait.max(next_midnight_utc(now, self.config.timezone) - now);
        }

        wait.to_std().unwrap_or(Duration::ZERO)
    }

    /// Current counters.
    pub async fn budget(&self) -> Result<RateBudget> {
        self.budget_at(self.clock.now()).await
    }

    async fn budget_at(&self, now: DateTime<Utc>) -> Result<RateBudget> {
        self.store.snapshot(now, self.today(now)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ManualClock;
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct FailingStore;

    #[async_trait]
    impl BudgetStore for FailingStore {
        async fn try_consume(&self, _request: &BudgetRequest) -> Result<bool> {
            Err(Error::Unexpected("store offline".to_string()))
        }

        async fn snapshot(&self, _now: DateTime<Utc>, _day: NaiveDate) -> Result<RateBudget> {
            Err(Error::Unexpected("store offline".to_string()))
        }
    }

    fn limiter(per_minute: u32, per_day: u32, clock: &ManualClock) -> RateLimiter {
        RateLimiter::in_memory(
            RateLimitConfig {
                requests_per_minute: per_minute,
                requests_per_day: per_day,
                ..Default::default()
            },
            Arc::new(clock.clone()),
        )
        .unwrap()
    }

    fn market_open() -> DateTime<Utc> {
        // 10:00 in New York
        Utc.with_ymd_and_hms(2024, 1, 12, 15, 0, 0).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_never_exceed_quota() {
        let clock = ManualClock::new(market_open());
        let limiter = Arc::new(limiter(5, 25, &clock));

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.consume_token().await })
            })
            .collect();

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 5);
        assert_eq!(limiter.budget().await.unwrap().calls_this_minute, 5);
    }

    #[tokio::test]
    async fn test_calls_beyond_minute_quota_are_denied() {
        let clock = ManualClock::new(market_open());
        let limiter = limiter(5, 25, &clock);

        let mut granted = 0;
        for _ in 0..8 {
            if limiter.consume_token().await {
                granted += 1;
            }
        }
        assert_eq!(granted, 5);
        assert!(!limiter.can_make_request().await);
    }

    #[tokio::test]
    async fn test_time_until_available_tracks_oldest_call() {
        let clock = ManualClock::new(market_open());
        let limiter = limiter(2, 25, &clock);

        assert_eq!(limiter.time_until_available().await, Duration::ZERO);

        assert!(limiter.consume_token().await);
        clock.advance(chrono::Duration::seconds(20));
        assert!(limiter.consume_token().await);

        assert_eq!(
            limiter.time_until_available().await,
            Duration::from_secs(40)
        );

        clock.advance(chrono::Duration::seconds(40));
        assert!(limiter.can_make_request().await);
        assert_eq!(limiter.time_until_available().await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_daily_quota_waits_for_market_midnight() {
        let clock = ManualClock::new(market_open());
        let limiter = limiter(10, 1, &clock);

        assert!(limiter.consume_token().await);
        clock.advance(chrono::Duration::minutes(5));
        assert!(!limiter.consume_token().await);

        // 15:05 UTC -> next New York midnight at 05:00 UTC
        assert_eq!(
            limiter.time_until_available().await,
            Duration::from_secs((13 * 60 + 55) * 60)
        );

        clock.set(Utc.with_ymd_and_hms(2024, 1, 13, 5, 0, 0).unwrap());
        assert!(limiter.consume_token().await);
    }

    #[tokio::test]
    async fn test_budget_snapshot() {
        let clock = ManualClock::new(market_open());
        let limiter = limiter(5, 25, &clock);

        limiter.consume_token().await;
        limiter.consume_token().await;

        let budget = limiter.budget().await.unwrap();
        assert_eq!(budget.calls_this_minute, 2);
        assert_eq!(budget.calls_today, 2);
        assert_eq!(budget.day, NaiveDate::from_ymd_opt(2024, 1, 12).unwrap());
        assert_eq!(budget.oldest_call_in_window, Some(market_open()));
    }

    #[tokio::test]
    async fn test_failing_store_fails_closed() {
        let clock = ManualClock::new(market_open());
        let limiter = RateLimiter::new(
            RateLimitConfig::default(),
            Arc::new(FailingStore),
            Arc::new(clock),
        )
        .unwrap();

        assert!(!limiter.consume_token().await);
        assert!(!limiter.can_make_request().await);
        assert!(limiter.time_until_available().await > Duration::ZERO);
    }

    #[test]
    fn test_zero_quota_is_rejected() {
        let config = RateLimitConfig {
            requests_per_minute: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfigValue(_))
        ));
    }
}
