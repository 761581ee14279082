// =============================================================================
// Market-Hours Oracle
// =============================================================================
//
// Pure function mapping "now" (in US/Eastern civil time) to the "latest
// trading date" used by the EOD auto-backfill service. Deliberately
// does not model exchange holidays — the backfill service tolerates
// "no data for this date" vendor responses.
// =============================================================================

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Weekday};
use chrono_tz::America::New_York;
use chrono_tz::Tz;

/// The trading date a stale `get_latest_eod_batch` call should target, given
/// the current instant. Rules, evaluated in order:
///
/// 1. Before 16:00 local on a weekday → the preceding weekday.
/// 2. At/after 16:00 local on a weekday → today.
/// 3. Weekend → the preceding Friday.
pub fn latest_trading_date(now_utc: DateTime<chrono::Utc>) -> NaiveDate {
    let now_et = now_utc.with_timezone(&New_York);
    latest_trading_date_in_tz(now_et)
}

fn latest_trading_date_in_tz(now_et: DateTime<Tz>) -> NaiveDate {
    let today = now_et.date_naive();
    let close_time = NaiveTime::from_hms_opt(16, 0, 0).expect("valid time");

    match today.weekday() {
        Weekday::Sat => preceding_weekday(today, 1),
        Weekday::Sun => preceding_weekday(today, 2),
        _ => {
            if now_et.time() < close_time {
                preceding_weekday(today, 1)
            } else {
                today
            }
        }
    }
}

/// Walk backward `at_least` days from `from`, then continue walking back
/// over any weekend days encountered, landing on the nearest prior weekday.
fn preceding_weekday(from: NaiveDate, at_least: i64) -> NaiveDate {
    let mut date = from - chrono::Duration::days(at_least);
    loop {
        match date.weekday() {
            Weekday::Sat => date -= chrono::Duration::days(1),
            Weekday::Sun => date -= chrono::Duration::days(2),
            _ => break,
        }
    }
    date
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn et(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        New_York.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn weekday_before_close_returns_preceding_weekday() {
        // Wednesday 2025-01-29 at 10:00 ET -> Tuesday 2025-01-28.
        let now = et(2025, 1, 29, 10, 0);
        assert_eq!(
            latest_trading_date_in_tz(now),
            NaiveDate::from_ymd_opt(2025, 1, 28).unwrap()
        );
    }

    #[test]
    fn weekday_at_close_returns_today() {
        let now = et(2025, 1, 29, 16, 0);
        assert_eq!(
            latest_trading_date_in_tz(now),
            NaiveDate::from_ymd_opt(2025, 1, 29).unwrap()
        );
    }

    #[test]
    fn monday_before_close_returns_preceding_friday() {
        // Monday 2025-01-27 at 09:00 ET -> Friday 2025-01-24.
        let now = et(2025, 1, 27, 9, 0);
        assert_eq!(
            latest_trading_date_in_tz(now),
            NaiveDate::from_ymd_opt(2025, 1, 24).unwrap()
        );
    }

    #[test]
    fn saturday_returns_preceding_friday() {
        let now = et(2025, 2, 1, 12, 0);
        assert_eq!(
            latest_trading_date_in_tz(now),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
        );
    }

    #[test]
    fn sunday_returns_preceding_friday() {
        let now = et(2025, 2, 2, 12, 0);
        assert_eq!(
            latest_trading_date_in_tz(now),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
        );
    }

    #[test]
    fn monday_after_close_returns_monday() {
        let now = et(2025, 1, 27, 17, 0);
        assert_eq!(
            latest_trading_date_in_tz(now),
            NaiveDate::from_ymd_opt(2025, 1, 27).unwrap()
        );
    }

    #[test]
    fn is_deterministic_for_same_input() {
        let now = et(2025, 1, 29, 10, 0);
        assert_eq!(
            latest_trading_date_in_tz(now),
            latest_trading_date_in_tz(now)
        );
    }
}
