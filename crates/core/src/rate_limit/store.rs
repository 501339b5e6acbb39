//! Counter storage behind the rate limiter.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::warn;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use super::RateBudget;
use crate::errors::Result;

/// Length of the rolling per-minute window in seconds.
pub const MINUTE_WINDOW_SECS: i64 = 60;

pub fn minute_window() -> Duration {
    Duration::seconds(MINUTE_WINDOW_SECS)
}

/// One check-and-consume request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetRequest {
    pub now: DateTime<Utc>,
    /// Calendar day of `now` in the budget's reference timezone.
    pub day: NaiveDate,
    pub requests_per_minute: u32,
    pub requests_per_day: u32,
}

impl BudgetRequest {
    /// Calls made at or before this instant no longer count against the minute.
    pub fn window_start(&self) -> DateTime<Utc> {
        self.now - minute_window()
    }
}

/// Shared counter store.
///
/// `try_consume` must be atomic: concurrent callers (threads or processes
/// sharing the store) never both succeed on the last unit of quota.
#[async_trait]
pub trait BudgetStore: Send + Sync {
    /// Record one call if both quotas have headroom. Returns whether it was recorded.
    async fn try_consume(&self, request: &BudgetRequest) -> Result<bool>;

    /// Current counters without consuming anything.
    async fn snapshot(&self, now: DateTime<Utc>, day: NaiveDate) -> Result<RateBudget>;
}

#[derive(Debug, Default)]
struct InMemoryState {
    calls: VecDeque<DateTime<Utc>>,
    day: Option<NaiveDate>,
    calls_today: u32,
}

impl InMemoryState {
    fn roll(&mut self, now: DateTime<Utc>, day: NaiveDate) {
        let window_start = now - minute_window();
        while self.calls.front().is_some_and(|t| *t <= window_start) {
            self.calls.pop_front();
        }
        if self.day != Some(day) {
            self.day = Some(day);
            self.calls_today = 0;
        }
    }

    fn budget(&self, day: NaiveDate) -> RateBudget {
        RateBudget {
            calls_this_minute: self.calls.len() as u32,
            calls_today: self.calls_today,
            day,
            oldest_call_in_window: self.calls.front().copied(),
        }
    }
}

/// Single-process store: a sliding log of call instants plus a day counter.
#[derive(Debug, Default)]
pub struct InMemoryBudgetStore {
    state: Mutex<InMemoryState>,
}

impl InMemoryBudgetStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Budget store mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

#[async_trait]
impl BudgetStore for InMemoryBudgetStore {
    async fn try_consume(&self, request: &BudgetRequest) -> Result<bool> {
        let mut state = self.lock_state();
        state.roll(request.now, request.day);

        if state.calls.len() as u32 >= request.requests_per_minute
            || state.calls_today >= request.requests_per_day
        {
            return Ok(false);
        }

        state.calls.push_back(request.now);
        state.calls_today += 1;
        Ok(true)
    }

    async fn snapshot(&self, now: DateTime<Utc>, day: NaiveDate) -> Result<RateBudget> {
        let mut state = self.lock_state();
        state.roll(now, day);
        Ok(state.budget(day))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request(now: DateTime<Utc>, per_minute: u32, per_day: u32) -> BudgetRequest {
        BudgetRequest {
            now,
            day: now.date_naive(),
            requests_per_minute: per_minute,
            requests_per_day: per_day,
        }
    }

    #[tokio::test]
    async fn test_minute_window_slides() {
        let store = InMemoryBudgetStore::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 12, 15, 0, 0).unwrap();

        assert!(store.try_consume(&request(t0, 2, 100)).await.unwrap());
        assert!(store
            .try_consume(&request(t0 + Duration::seconds(10), 2, 100))
            .await
            .unwrap());
        assert!(!store
            .try_consume(&request(t0 + Duration::seconds(59), 2, 100))
            .await
            .unwrap());

        // First call leaves the window at t0 + 60s
        assert!(store
            .try_consume(&request(t0 + Duration::seconds(60), 2, 100))
            .await
            .unwrap());

        let budget = store
            .snapshot(t0 + Duration::seconds(60), t0.date_naive())
            .await
            .unwrap();
        assert_eq!(budget.calls_this_minute, 2);
        assert_eq!(budget.calls_today, 3);
        assert_eq!(
            budget.oldest_call_in_window,
            Some(t0 + Duration::seconds(10))
        );
    }

    #[tokio::test]
    async fn test_day_counter_resets_on_new_day() {
        let store = InMemoryBudgetStore::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 12, 15, 0, 0).unwrap();

        assert!(store.try_consume(&request(t0, 10, 1)).await.unwrap());
        assert!(!store
            .try_consume(&request(t0 + Duration::minutes(5), 10, 1))
            .await
            .unwrap());

        let next_day = t0 + Duration::days(1);
        assert!(store.try_consume(&request(next_day, 10, 1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_denied_call_leaves_state_unchanged() {
        let store = InMemoryBudgetStore::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 12, 15, 0, 0).unwrap();

        assert!(store.try_consume(&request(t0, 1, 10)).await.unwrap());
        assert!(!store.try_consume(&request(t0, 1, 10)).await.unwrap());

        let budget = store.snapshot(t0, t0.date_naive()).await.unwrap();
        assert_eq!(budget.calls_this_minute, 1);
        assert_eq!(budget.calls_today, 1);
    }
}
