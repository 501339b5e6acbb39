//! Holiday rules and their resolution to concrete dates.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// How a fixed-date holiday moves when it falls on a weekend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Observance {
    /// Saturday moves to Friday, Sunday moves to Monday.
    NearestWeekday,
    /// Only Sunday moves (to Monday); a Saturday holiday is simply lost.
    SundayToMonday,
    /// Never moves.
    None,
}

/// The shape of a holiday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HolidayKind {
    Fixed {
        month: u32,
        day: u32,
        observance: Observance,
    },
    /// `n`-th `weekday` of `month` (1-based).
    NthWeekday { month: u32, weekday: Weekday, n: u8 },
    LastWeekday { month: u32, weekday: Weekday },
    /// Days relative to Western Easter Sunday (Good Friday is -2).
    EasterOffset { days: i64 },
}

/// A named holiday, optionally only observed from a given year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayRule {
    pub name: String,
    pub kind: HolidayKind,
    #[serde(default)]
    pub since: Option<i32>,
}

impl HolidayRule {
    pub fn new(name: impl Into<String>, kind: HolidayKind) -> Self {
        Self {
            name: name.into(),
            kind,
            since: None,
        }
    }

    pub fn since(mut self, year: i32) -> Self {
        self.since = Some(year);
        self
    }

    /// The date this rule closes the market in `year`, if any.
    ///
    /// An observed date can land in a neighbouring year (1 Jan on a Saturday
    /// observed on 31 Dec). Callers filter by year.
    pub fn resolve(&self, year: i32) -> Option<NaiveDate> {
        if self.since.is_some_and(|since| year < since) {
            return None;
        }

        match self.kind {
            HolidayKind::Fixed {
                month,
                day,
                observance,
            } => NaiveDate::from_ymd_opt(year, month, day).and_then(|d| observe(d, observance)),
            HolidayKind::NthWeekday { month, weekday, n } => {
                NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
            }
            HolidayKind::LastWeekday { month, weekday } => last_weekday_of_month(year, month, weekday),
            HolidayKind::EasterOffset { days } => {
                easter_sunday(year).map(|easter| easter + Duration::days(days))
            }
        }
    }
}

fn observe(date: NaiveDate, observance: Observance) -> Option<NaiveDate> {
    match (observance, date.weekday()) {
        (Observance::NearestWeekday, Weekday::Sat) => Some(date - Duration::days(1)),
        (Observance::NearestWeekday, Weekday::Sun) => Some(date + Duration::days(1)),
        (Observance::SundayToMonday, Weekday::Sat) => None,
        (Observance::SundayToMonday, Weekday::Sun) => Some(date + Duration::days(1)),
        _ => Some(date),
    }
}

fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = first_of_next.pred_opt()?;
    let back = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    Some(last - Duration::days(back as i64))
}

/// Western Easter Sunday (anonymous Gregorian algorithm).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// Holidays observed by the New York Stock Exchange.
pub fn nyse_rules() -> Vec<HolidayRule> {
    vec![
        HolidayRule::new(
            "New Year's Day",
            HolidayKind::Fixed {
                month: 1,
                day: 1,
                observance: Observance::SundayToMonday,
            },
        ),
        HolidayRule::new(
            "Martin Luther King Jr. Day",
            HolidayKind::NthWeekday {
                month: 1,
                weekday: Weekday::Mon,
                n: 3,
            },
        ),
        HolidayRule::new(
            "Presidents' Day",
            HolidayKind::NthWeekday {
                month: 2,
                weekday: Weekday::Mon,
                n: 3,
            },
        ),
        HolidayRule::new("Good Friday", HolidayKind::EasterOffset { days: -2 }),
        HolidayRule::new(
            "Memorial Day",
            HolidayKind::LastWeekday {
                month: 5,
                weekday: Weekday::Mon,
            },
        ),
        HolidayRule::new(
            "Juneteenth",
            HolidayKind::Fixed {
                month: 6,
                day: 19,
                observance: Observance::NearestWeekday,
            },
        )
        .since(2022),
        HolidayRule::new(
            "Independence Day",
            HolidayKind::Fixed {
                month: 7,
                day: 4,
                observance: Observance::NearestWeekday,
            },
        ),
        HolidayRule::new(
            "Labor Day",
            HolidayKind::NthWeekday {
                month: 9,
                weekday: Weekday::Mon,
                n: 1,
            },
        ),
        HolidayRule::new(
            "Thanksgiving Day",
            HolidayKind::NthWeekday {
                month: 11,
                weekday: Weekday::Thu,
                n: 4,
            },
        ),
        HolidayRule::new(
            "Christmas Day",
            HolidayKind::Fixed {
                month: 12,
                day: 25,
                observance: Observance::NearestWeekday,
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_easter_dates() {
        assert_eq!(easter_sunday(2024), Some(date(2024, 3, 31)));
        assert_eq!(easter_sunday(2025), Some(date(2025, 4, 20)));
        assert_eq!(easter_sunday(2026), Some(date(2026, 4, 5)));
        assert_eq!(easter_sunday(2000), Some(date(2000, 4, 23)));
    }

    #[test]
    fn test_last_weekday_of_month() {
        assert_eq!(
            last_weekday_of_month(2024, 5, Weekday::Mon),
            Some(date(2024, 5, 27))
        );
        assert_eq!(
            last_weekday_of_month(2024, 12, Weekday::Tue),
            Some(date(2024, 12, 31))
        );
    }

    #[test]
    fn test_fixed_observance() {
        let july4 = HolidayRule::new(
            "Independence Day",
            HolidayKind::Fixed {
                month: 7,
                day: 4,
                observance: Observance::NearestWeekday,
            },
        );
        // 2026-07-04 is a Saturday
        assert_eq!(july4.resolve(2026), Some(date(2026, 7, 3)));
        // 2027-07-04 is a Sunday
        assert_eq!(july4.resolve(2027), Some(date(2027, 7, 5)));
    }

    #[test]
    fn test_new_year_on_saturday_is_not_observed() {
        let rules = nyse_rules();
        let new_year = &rules[0];
        // 2022-01-01 is a Saturday; NYSE stayed open on 2021-12-31
        assert_eq!(new_year.resolve(2022), None);
        // 2023-01-01 is a Sunday
        assert_eq!(new_year.resolve(2023), Some(date(2023, 1, 2)));
    }

    #[test]
    fn test_since_year() {
        let juneteenth = nyse_rules()
            .into_iter()
            .find(|r| r.name == "Juneteenth")
            .unwrap();
        assert_eq!(juneteenth.resolve(2021), None);
        assert_eq!(juneteenth.resolve(2022), Some(date(2022, 6, 20)));
    }
}
