use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Default market timezone.
/// This is the canonical timezone used to convert UTC instants to market dates
/// and to reset the daily request budget.
pub const DEFAULT_MARKET_TZ: Tz = chrono_tz::America::New_York;

/// Converts a UTC instant to the market date in the given timezone.
///
/// This is the single source of truth for converting instants to domain dates.
pub fn market_date_from_utc(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// The UTC instant of the next local midnight in `tz` strictly after `instant`.
///
/// Falls back to 24 hours later if the local midnight does not exist.
pub fn next_midnight_utc(instant: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let tomorrow = market_date_from_utc(instant, tz) + Duration::days(1);
    tomorrow
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| tz.from_local_datetime(&midnight).earliest())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| instant + Duration::days(1))
}

/// Midnight UTC of a date; the canonical timestamp of a daily observation.
pub fn start_of_day_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// UTC instant at which `date` begins in `tz`.
///
/// Falls back to midnight UTC if the local midnight does not exist.
pub fn start_of_market_day_utc(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    tz.from_local_datetime(&date.and_time(chrono::NaiveTime::MIN))
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| start_of_day_utc(date))
}

pub fn get_days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    start.iter_days().take_while(|d| *d <= end).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_date_crosses_utc_midnight() {
        // 02:00 UTC on the 13th is still the 12th in New York
        let instant = Utc.with_ymd_and_hms(2024, 1, 13, 2, 0, 0).unwrap();
        assert_eq!(
            market_date_from_utc(instant, DEFAULT_MARKET_TZ),
            NaiveDate::from_ymd_opt(2024, 1, 12).unwrap()
        );
    }

    #[test]
    fn test_next_midnight_in_new_york() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 12, 20, 0, 0).unwrap();
        let midnight = next_midnight_utc(instant, DEFAULT_MARKET_TZ);
        // EST midnight is 05:00 UTC
        assert_eq!(midnight, Utc.with_ymd_and_hms(2024, 1, 13, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_get_days_between() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 30).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 2, 2).unwrap();
        let days = get_days_between(start, end);
        assert_eq!(days.len(), 4);
        assert_eq!(days[0], start);
        assert_eq!(days[3], end);
        assert!(get_days_between(end, start).is_empty());
    }

    #[test]
    fn test_start_of_market_day_tracks_daylight_saving() {
        let winter = NaiveDate::from_ymd_opt(2024, 1, 12).unwrap();
        let summer = NaiveDate::from_ymd_opt(2024, 7, 12).unwrap();
        assert_eq!(
            start_of_market_day_utc(winter, DEFAULT_MARKET_TZ),
            Utc.with_ymd_and_hms(2024, 1, 12, 5, 0, 0).unwrap()
        );
        assert_eq!(
            start_of_market_day_utc(summer, DEFAULT_MARKET_TZ),
            Utc.with_ymd_and_hms(2024, 7, 12, 4, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_start_of_day_utc() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 12).unwrap();
        assert_eq!(
            start_of_day_utc(date),
            Utc.with_ymd_and_hms(2024, 1, 12, 0, 0, 0).unwrap()
        );
    }
}
