//! Trading calendar.
//!
//! Answers "is the market open on this date?" from weekend rules plus a set
//! of holiday rules resolved per year. Resolved years are memoised for the
//! life of the calendar; nothing is persisted.

mod rules;

pub use rules::{easter_sunday, nyse_rules, HolidayKind, HolidayRule, Observance};

use chrono::{Datelike, NaiveDate, Weekday};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::utils::time_utils::get_days_between;

/// Market calendar with memoised per-year holiday sets.
#[derive(Debug)]
pub struct TradingCalendar {
    rules: Vec<HolidayRule>,
    resolved: DashMap<i32, Arc<BTreeSet<NaiveDate>>>,
}

impl TradingCalendar {
    pub fn new(rules: Vec<HolidayRule>) -> Self {
        Self {
            rules,
            resolved: DashMap::new(),
        }
    }

    /// New York Stock Exchange calendar.
    pub fn nyse() -> Self {
        Self::new(nyse_rules())
    }

    pub fn rules(&self) -> &[HolidayRule] {
        &self.rules
    }

    /// Holidays that fall on (or are observed on) a date in `year`.
    pub fn holidays(&self, year: i32) -> Arc<BTreeSet<NaiveDate>> {
        if let Some(cached) = self.resolved.get(&year) {
            return Arc::clone(cached.value());
        }

        // Observed dates can spill across a year boundary
        let set: BTreeSet<NaiveDate> = [year - 1, year, year + 1]
            .into_iter()
            .flat_map(|y| self.rules.iter().filter_map(move |rule| rule.resolve(y)))
            .filter(|d| d.year() == year)
            .collect();

        let set = Arc::new(set);
        self.resolved.insert(year, Arc::clone(&set));
        set
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays(date.year()).contains(&date)
    }

    /// True unless `date` is a Saturday, a Sunday or a holiday.
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.is_holiday(date)
    }

    /// Most recent trading day strictly before `date`.
    pub fn previous_trading_day(&self, date: NaiveDate) -> Option<NaiveDate> {
        let mut current = date.pred_opt()?;
        while !self.is_trading_day(current) {
            current = current.pred_opt()?;
        }
        Some(current)
    }

    /// `date` itself if it is a trading day, otherwise the previous one.
    pub fn last_trading_day_on_or_before(&self, date: NaiveDate) -> Option<NaiveDate> {
        if self.is_trading_day(date) {
            Some(date)
        } else {
            self.previous_trading_day(date)
        }
    }

    /// Trading days in `[start, end]`, ascending.
    pub fn trading_days(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        get_days_between(start, end)
            .into_iter()
            .filter(|d| self.is_trading_day(*d))
            .collect()
    }
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self::nyse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_nyse_holidays_2024() {
        let calendar = TradingCalendar::nyse();
        let expected: BTreeSet<NaiveDate> = [
            date(2024, 1, 1),
            date(2024, 1, 15),
            date(2024, 2, 19),
            date(2024, 3, 29),
            date(2024, 5, 27),
            date(2024, 6, 19),
            date(2024, 7, 4),
            date(2024, 9, 2),
            date(2024, 11, 28),
            date(2024, 12, 25),
        ]
        .into_iter()
        .collect();
        assert_eq!(*calendar.holidays(2024), expected);
    }

    #[test]
    fn test_nyse_holidays_2026_observed() {
        let calendar = TradingCalendar::nyse();
        let holidays = calendar.holidays(2026);
        assert!(holidays.contains(&date(2026, 4, 3)));
        assert!(holidays.contains(&date(2026, 7, 3)));
        assert!(!holidays.contains(&date(2026, 7, 4)));
        assert_eq!(holidays.len(), 10);
    }

    #[test]
    fn test_weekends_are_not_trading_days() {
        let calendar = TradingCalendar::nyse();
        assert!(!calendar.is_trading_day(date(2024, 1, 13)));
        assert!(!calendar.is_trading_day(date(2024, 1, 14)));
        assert!(calendar.is_trading_day(date(2024, 1, 12)));
    }

    #[test]
    fn test_previous_trading_day_skips_long_weekend() {
        let calendar = TradingCalendar::nyse();
        // Tuesday after MLK day -> previous Friday
        assert_eq!(
            calendar.previous_trading_day(date(2024, 1, 16)),
            Some(date(2024, 1, 12))
        );
        assert_eq!(
            calendar.last_trading_day_on_or_before(date(2024, 1, 15)),
            Some(date(2024, 1, 12))
        );
        assert_eq!(
            calendar.last_trading_day_on_or_before(date(2024, 1, 16)),
            Some(date(2024, 1, 16))
        );
    }

    #[test]
    fn test_trading_days_in_range() {
        let calendar = TradingCalendar::nyse();
        let days = calendar.trading_days(date(2024, 1, 1), date(2024, 1, 31));
        // 23 weekdays minus New Year's Day and MLK day
        assert_eq!(days.len(), 21);
        assert_eq!(days.first(), Some(&date(2024, 1, 2)));
        assert!(calendar
            .trading_days(date(2024, 1, 13), date(2024, 1, 15))
            .is_empty());
    }

    #[test]
    fn test_holidays_are_memoised() {
        let calendar = TradingCalendar::nyse();
        let first = calendar.holidays(2025);
        let second = calendar.holidays(2025);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_custom_rules() {
        let calendar = TradingCalendar::new(vec![HolidayRule::new(
            "Founders Day",
            HolidayKind::Fixed {
                month: 3,
                day: 5,
                observance: Observance::None,
            },
        )]);
        assert!(!calendar.is_trading_day(date(2024, 3, 5)));
        assert!(calendar.is_trading_day(date(2024, 3, 29)));
    }
}
