//! Shared rate-budget counters on SQLite.
//!
//! Several processes pointing at the same database file share one budget.
//! Check-and-consume runs inside the writer's `BEGIN IMMEDIATE` transaction,
//! which takes the database write lock before reading the counters, so two
//! processes can never both take the last unit of quota.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::dsl::{count_star, min};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;
use std::sync::Arc;

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::prices::format_instant;
use crate::schema::rate_budget_calls::dsl as calls;
use crate::schema::rate_budget_days::dsl as days;
use pricevault_core::rate_limit::{minute_window, BudgetRequest, BudgetStore, RateBudget};
use pricevault_core::Result;

pub struct SqliteBudgetStore {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SqliteBudgetStore {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

fn calls_in_window(conn: &mut SqliteConnection, window_start: &str) -> QueryResult<i64> {
    calls::rate_budget_calls
        .filter(calls::called_at.gt(window_start))
        .select(count_star())
        .first(conn)
}

fn calls_on_day(conn: &mut SqliteConnection, day: &str) -> QueryResult<i32> {
    Ok(days::rate_budget_days
        .filter(days::day.eq(day))
        .select(days::calls)
        .first::<i32>(conn)
        .optional()?
        .unwrap_or(0))
}

#[async_trait]
impl BudgetStore for SqliteBudgetStore {
    async fn try_consume(&self, request: &BudgetRequest) -> Result<bool> {
        let window_start = format_instant(request.window_start());
        let now = format_instant(request.now);
        let day = day_key(request.day);
        let per_minute = i64::from(request.requests_per_minute);
        let per_day = i64::from(request.requests_per_day);

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<bool> {
                diesel::delete(calls::rate_budget_calls.filter(calls::called_at.le(&window_start)))
                    .execute(conn)
                    .map_err(StorageError::QueryFailed)?;

                let in_window =
                    calls_in_window(conn, &window_start).map_err(StorageError::QueryFailed)?;
                let today = calls_on_day(conn, &day).map_err(StorageError::QueryFailed)?;

                if in_window >= per_minute || i64::from(today) >= per_day {
                    debug!(
                        "Budget denied: {}/{} this minute, {}/{} on {}",
                        in_window, per_minute, today, per_day, day
                    );
                    return Ok(false);
                }

                diesel::insert_into(calls::rate_budget_calls)
                    .values(calls::called_at.eq(&now))
                    .execute(conn)
                    .map_err(StorageError::QueryFailed)?;
                diesel::replace_into(days::rate_budget_days)
                    .values((days::day.eq(&day), days::calls.eq(today + 1)))
                    .execute(conn)
                    .map_err(StorageError::QueryFailed)?;
                Ok(true)
            })
            .await
    }

    async fn snapshot(&self, now: DateTime<Utc>, day: NaiveDate) -> Result<RateBudget> {
        let window_start = format_instant(now - minute_window());
        let mut conn = get_connection(&self.pool)?;

        let in_window = calls_in_window(&mut conn, &window_start).into_core()?;
        let today = calls_on_day(&mut conn, &day_key(day)).into_core()?;
        let oldest: Option<String> = calls::rate_budget_calls
            .filter(calls::called_at.gt(&window_start))
            .select(min(calls::called_at))
            .first(&mut conn)
            .into_core()?;

        let oldest_call_in_window = oldest
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|_| StorageError::MalformedRow(format!("called_at = {:?}", s)))
            })
            .transpose()?;

        Ok(RateBudget {
            calls_this_minute: u32::try_from(in_window).unwrap_or(u32::MAX),
            calls_today: u32::try_from(today).unwrap_or(0),
            day,
            oldest_call_in_window,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open;
    use chrono::{Duration, TimeZone};
    use pricevault_core::rate_limit::{RateLimitConfig, RateLimiter};
    use pricevault_core::utils::ManualClock;

    fn request(now: DateTime<Utc>, per_minute: u32, per_day: u32) -> BudgetRequest {
        BudgetRequest {
            now,
            day: now.date_naive(),
            requests_per_minute: per_minute,
            requests_per_day: per_day,
        }
    }

    #[tokio::test]
    async fn test_minute_quota_and_window() {
        let dir = tempfile::tempdir().unwrap();
        let (pool, writer) = open(dir.path().join("budget.db").to_str().unwrap()).unwrap();
        let store = SqliteBudgetStore::new(pool, writer);
        let t0 = Utc.with_ymd_and_hms(2024, 1, 12, 15, 0, 0).unwrap();

        assert!(store.try_consume(&request(t0, 2, 100)).await.unwrap());
        assert!(store
            .try_consume(&request(t0 + Duration::seconds(10), 2, 100))
            .await
            .unwrap());
        assert!(!store
            .try_consume(&request(t0 + Duration::seconds(30), 2, 100))
            .await
            .unwrap());
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
        assert_eq!(budget.oldest_call_in_window, Some(t0 + Duration::seconds(10)));
    }

    #[tokio::test]
    async fn test_daily_quota() {
        let dir = tempfile::tempdir().unwrap();
        let (pool, writer) = open(dir.path().join("budget.db").to_str().unwrap()).unwrap();
        let store = SqliteBudgetStore::new(pool, writer);
        let t0 = Utc.with_ymd_and_hms(2024, 1, 12, 15, 0, 0).unwrap();

        assert!(store.try_consume(&request(t0, 10, 1)).await.unwrap());
        assert!(!store
            .try_consume(&request(t0 + Duration::minutes(5), 10, 1))
            .await
            .unwrap());
        assert!(store
            .try_consume(&request(t0 + Duration::days(1), 10, 1))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_budget_is_shared_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("budget.db");
        let (pool_a, writer_a) = open(path.to_str().unwrap()).unwrap();
        let (pool_b, writer_b) = open(path.to_str().unwrap()).unwrap();

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 12, 15, 0, 0).unwrap(),
        ));
        let config = RateLimitConfig {
            requests_per_minute: 3,
            requests_per_day: 100,
            ..Default::default()
        };
        let a = RateLimiter::new(
            config.clone(),
            Arc::new(SqliteBudgetStore::new(pool_a, writer_a)),
            clock.clone(),
        )
        .unwrap();
        let b = RateLimiter::new(
            config,
            Arc::new(SqliteBudgetStore::new(pool_b, writer_b)),
            clock.clone(),
        )
        .unwrap();

        let mut granted = 0;
        for _ in 0..4 {
            if a.consume_token().await {
                granted += 1;
            }
            if b.consume_token().await {
                granted += 1;
            }
        }
        assert_eq!(granted, 3);
        assert_eq!(b.budget().await.unwrap().calls_this_minute, 3);
    }
}
