//! Property-based tests for the trading calendar.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use proptest::prelude::*;
use pricevault_core::calendar::TradingCalendar;

// =============================================================================
// Generators
// =============================================================================

/// Any date between 1990 and 2099.
fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (1990i32..2100, 1u32..=366).prop_filter_map("valid ordinal", |(year, ordinal)| {
        NaiveDate::from_yo_opt(year, ordinal)
    })
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Weekends and holidays are never trading days.
    #[test]
    fn prop_weekends_and_holidays_never_trade(date in arb_date()) {
        let calendar = TradingCalendar::nyse();
        let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);

        if weekend || calendar.is_holiday(date) {
            prop_assert!(!calendar.is_trading_day(date));
        } else {
            prop_assert!(calendar.is_trading_day(date));
        }
    }

    /// Every resolved holiday falls on a weekday.
    #[test]
    fn prop_holidays_are_observed_on_weekdays(year in 1990i32..2100) {
        let calendar = TradingCalendar::nyse();
        for holiday in calendar.holidays(year).iter() {
            prop_assert!(!matches!(holiday.weekday(), Weekday::Sat | Weekday::Sun));
            prop_assert_eq!(holiday.year(), year);
        }
    }

    /// The previous trading day is strictly earlier, trades, and nothing
    /// between the two does.
    #[test]
    fn prop_previous_trading_day_is_nearest(date in arb_date()) {
        let calendar = TradingCalendar::nyse();
        let previous = calendar.previous_trading_day(date);
        prop_assert!(previous.is_some());
        let previous = previous.unwrap();

        prop_assert!(previous < date);
        prop_assert!(calendar.is_trading_day(previous));
        let mut between = previous + Duration::days(1);
        while between < date {
            prop_assert!(!calendar.is_trading_day(between));
            between += Duration::days(1);
        }
    }

    /// `trading_days` agrees with `is_trading_day` over any window.
    #[test]
    fn prop_trading_days_matches_predicate(start in arb_date(), span in 0i64..120) {
        let calendar = TradingCalendar::nyse();
        let end = start + Duration::days(span);

        let listed = calendar.trading_days(start, end);
        let mut expected = Vec::new();
        let mut day = start;
        while day <= end {
            if calendar.is_trading_day(day) {
                expected.push(day);
            }
            day += Duration::days(1);
        }
        prop_assert_eq!(listed, expected);
    }
}
