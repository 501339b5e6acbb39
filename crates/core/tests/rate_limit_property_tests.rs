//! Property-based tests for the rate limiter.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::sync::Arc;

use pricevault_core::rate_limit::{RateLimitConfig, RateLimiter};
use pricevault_core::utils::{Clock, ManualClock};

// =============================================================================
// Generators
// =============================================================================

/// Gaps in milliseconds between consecutive call attempts.
fn arb_gaps() -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::vec(0i64..30_000, 1..80)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

/// Replays the attempts and returns the instants that were granted.
fn granted_instants(
    gaps: &[i64],
    requests_per_minute: u32,
    requests_per_day: u32,
) -> Vec<chrono::DateTime<Utc>> {
    // 14:00 New York, far from midnight so the day never rolls
    let start = Utc.with_ymd_and_hms(2024, 3, 12, 18, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let limiter = RateLimiter::in_memory(
        RateLimitConfig {
            requests_per_minute,
            requests_per_day,
            ..Default::default()
        },
        clock.clone(),
    )
    .unwrap();

    runtime().block_on(async {
        let mut granted = Vec::new();
        for gap in gaps {
            clock.advance(Duration::milliseconds(*gap));
            if limiter.consume_token().await {
                granted.push(clock.now());
            }
        }
        granted
    })
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// No rolling 60 second window ever holds more grants than the per-minute quota.
    #[test]
    fn prop_minute_quota_never_exceeded(gaps in arb_gaps(), rpm in 1u32..8) {
        let granted = granted_instants(&gaps, rpm, 10_000);

        for (i, at) in granted.iter().enumerate() {
            let in_window = granted[..=i]
                .iter()
                .filter(|t| **t > *at - Duration::seconds(60))
                .count();
            prop_assert!(in_window <= rpm as usize);
        }
    }

    /// The day never grants more than the daily quota.
    #[test]
    fn prop_daily_quota_never_exceeded(gaps in arb_gaps(), per_day in 1u32..20) {
        let granted = granted_instants(&gaps, 1_000, per_day);
        prop_assert!(granted.len() <= per_day as usize);
    }

    /// A denied attempt leaves the counters untouched.
    #[test]
    fn prop_denials_consume_nothing(extra in 1usize..10, rpm in 1u32..5) {
        let gaps = vec![0i64; rpm as usize + extra];
        let granted = granted_instants(&gaps, rpm, 10_000);
        prop_assert_eq!(granted.len(), rpm as usize);

        // one more minute later the full quota is available again
        let mut later = gaps.clone();
        later.push(60_001);
        later.extend(std::iter::repeat(0).take(rpm as usize));
        let granted = granted_instants(&later, rpm, 10_000);
        prop_assert_eq!(granted.len(), rpm as usize * 2);
    }
}
