//! Next-run calculation for recurring reports. Pure; no I/O.
//!
//! Runs always land at 09:00:00 local time (the schedule's configured offset).
//! A weekly schedule never fires twice on the same day: when today is the anchor
//! weekday the next run is a full week out.

use crate::domain::entities::Frequency;
use crate::domain::errors::DomainError;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};

/// Hour of day (local) at which scheduled reports fire.
pub const RUN_HOUR: u32 = 9;

/// Schedules due within this many seconds of "now" are picked up by a batch.
pub const DUE_WINDOW_SECS: i64 = 3600;

pub const DEFAULT_DAY_OF_WEEK: u8 = 1;
pub const DEFAULT_DAY_OF_MONTH: u8 = 1;

/// Upper bound of `next_run_at` for schedules a batch at `now` should process.
pub fn due_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now + TimeDelta::seconds(DUE_WINDOW_SECS)
}

/// Reject anchors outside 0..=6 (weekday) / 1..=31 (day of month).
pub fn validate_anchor(
    day_of_week: Option<u8>,
    day_of_month: Option<u8>,
) -> Result<(), DomainError> {
    if let Some(d) = day_of_week {
        if d > 6 {
            return Err(DomainError::validation(
                "dayOfWeek must be between 0 (Sunday) and 6 (Saturday)",
            ));
        }
    }
    if let Some(d) = day_of_month {
        if !(1..=31).contains(&d) {
            return Err(DomainError::validation("dayOfMonth must be between 1 and 31"));
        }
    }
    Ok(())
}

fn at_run_time(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(RUN_HOUR, 0, 0)
        .unwrap_or_else(|| date.and_time(chrono::NaiveTime::default()))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Next run strictly after `now` for the given frequency and anchor.
///
/// Weekly: anchor weekday (0 = Sunday, default Monday), 1..=7 days ahead.
/// Monthly: anchor day (default 1st) of the following calendar month, clamped to
/// that month's length.
pub fn next_run_after(
    frequency: Frequency,
    day_of_week: Option<u8>,
    day_of_month: Option<u8>,
    now: DateTime<FixedOffset>,
) -> DateTime<FixedOffset> {
    let today = now.date_naive();
    let target_date = match frequency {
        Frequency::Weekly => {
            let target = i64::from(day_of_week.unwrap_or(DEFAULT_DAY_OF_WEEK) % 7);
            let current = i64::from(today.weekday().num_days_from_sunday());
            let mut days_until = (target - current + 7) % 7;
            if days_until == 0 {
                days_until = 7;
            }
            today + TimeDelta::days(days_until)
        }
        Frequency::Monthly => {
            let (year, month) = if today.month() == 12 {
                (today.year() + 1, 1)
            } else {
                (today.year(), today.month() + 1)
            };
            let anchor = u32::from(day_of_month.unwrap_or(DEFAULT_DAY_OF_MONTH)).max(1);
            let day = anchor.min(days_in_month(year, month));
            NaiveDate::from_ymd_opt(year, month, day).unwrap_or(today + TimeDelta::days(28))
        }
    };

    let offset = *now.offset();
    offset
        .from_local_datetime(&at_run_time(target_date))
        .single()
        .unwrap_or(now + TimeDelta::days(7))
}

/// [`next_run_after`] evaluated in `offset`, returned in UTC for storage.
pub fn next_run_utc(
    frequency: Frequency,
    day_of_week: Option<u8>,
    day_of_month: Option<u8>,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> DateTime<Utc> {
    next_run_after(frequency, day_of_week, day_of_month, now.with_timezone(&offset))
        .with_timezone(&Utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        jst().with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn weekly_on_anchor_day_advances_full_week() {
        // 2024-03-11 is a Monday.
        let now = local(2024, 3, 11, 8, 0);
        assert_eq!(now.weekday(), Weekday::Mon);
        let next = next_run_after(Frequency::Weekly, Some(1), None, now);
        assert_eq!(next, local(2024, 3, 18, 9, 0));
    }

    #[test]
    fn weekly_defaults_to_monday() {
        let now = local(2024, 3, 13, 15, 30); // Wednesday
        let next = next_run_after(Frequency::Weekly, None, None, now);
        assert_eq!(next, local(2024, 3, 18, 9, 0));
        assert_eq!(next.weekday(), Weekday::Mon);
    }

    #[test]
    fn weekly_sunday_anchor_from_saturday_is_next_day() {
        let now = local(2024, 3, 16, 23, 59); // Saturday
        let next = next_run_after(Frequency::Weekly, Some(0), None, now);
        assert_eq!(next, local(2024, 3, 17, 9, 0));
    }

    #[test]
    fn monthly_first_is_first_of_next_month() {
        for day in [1, 15, 31] {
            let now = local(2024, 1, day, 12, 0);
            let next = next_run_after(Frequency::Monthly, None, Some(1), now);
            assert_eq!(next, local(2024, 2, 1, 9, 0));
        }
    }

    #[test]
    fn monthly_rolls_over_year_end() {
        let next = next_run_after(Frequency::Monthly, None, Some(5), local(2024, 12, 20, 9, 0));
        assert_eq!(next, local(2025, 1, 5, 9, 0));
    }

    #[test]
    fn monthly_anchor_clamps_to_short_month() {
        let next = next_run_after(Frequency::Monthly, None, Some(31), local(2024, 1, 10, 9, 0));
        assert_eq!(next, local(2024, 2, 29, 9, 0));
        let next = next_run_after(Frequency::Monthly, None, Some(31), local(2023, 3, 10, 9, 0));
        assert_eq!(next, local(2023, 4, 30, 9, 0));
    }

    #[test]
    fn utc_conversion_uses_local_run_hour() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap(); // Mon 05:00 JST
        let next = next_run_utc(Frequency::Weekly, Some(1), None, now, jst());
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 18, 0, 0, 0).unwrap());
    }

    #[test]
    fn anchors_are_validated() {
        assert!(validate_anchor(Some(6), Some(31)).is_ok());
        assert!(validate_anchor(Some(7), None).is_err());
        assert!(validate_anchor(None, Some(0)).is_err());
        assert!(validate_anchor(None, Some(32)).is_err());
    }

    #[test]
    fn due_window_is_one_hour() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap();
        assert_eq!(due_cutoff(now), Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap());
    }
}
