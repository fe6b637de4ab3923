//! Calendar week arithmetic for the weekly calculation phase
//!
//! Timestamps are Unix seconds. Weeks start on Monday 00:00 UTC.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};

/// Seconds in one calendar week
pub const SECONDS_PER_WEEK: i64 = 7 * 24 * 60 * 60;

/// Start of the calendar week that follows the week containing `timestamp`
///
/// Returns `None` if `timestamp` cannot be represented as a UTC datetime.
///
/// # Example
/// ```
/// use commission_ledger_core_rs::core::time::next_week_start;
///
/// // Wednesday 2024-01-03 12:00:00 UTC
/// let wednesday = 1_704_283_200;
/// // Monday 2024-01-08 00:00:00 UTC
/// assert_eq!(next_week_start(wednesday), Some(1_704_672_000));
/// ```
pub fn next_week_start(timestamp: i64) -> Option<i64> {
    let at = DateTime::<Utc>::from_timestamp(timestamp, 0)?;
    let days_into_week = i64::from(at.weekday().num_days_from_monday());
    let this_monday = at
        .date_naive()
        .checked_sub_signed(Duration::days(days_into_week))?;
    let next_monday = this_monday.checked_add_signed(Duration::days(7))?;
    Some(next_monday.and_time(NaiveTime::MIN).and_utc().timestamp())
}

/// Whole weeks elapsed from `start` to `timestamp`
///
/// Returns `None` when `timestamp` is before `start`.
pub fn weeks_between(start: i64, timestamp: i64) -> Option<u64> {
    if timestamp < start {
        return None;
    }
    u64::try_from((timestamp - start) / SECONDS_PER_WEEK).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Monday 2024-01-01 00:00:00 UTC
    const MONDAY: i64 = 1_704_067_200;

    #[test]
    fn test_monday_midnight_rolls_to_following_monday() {
        assert_eq!(next_week_start(MONDAY), Some(MONDAY + SECONDS_PER_WEEK));
    }

    #[test]
    fn test_sunday_last_second_rolls_to_next_day() {
        let sunday_end = MONDAY + SECONDS_PER_WEEK - 1;
        assert_eq!(next_week_start(sunday_end), Some(MONDAY + SECONDS_PER_WEEK));
    }

    #[test]
    fn test_epoch_thursday() {
        // 1970-01-01 was a Thursday; the next Monday is 1970-01-05
        assert_eq!(next_week_start(0), Some(4 * 24 * 60 * 60));
    }

    #[test]
    fn test_weeks_between() {
        assert_eq!(weeks_between(MONDAY, MONDAY), Some(0));
        assert_eq!(weeks_between(MONDAY, MONDAY + SECONDS_PER_WEEK - 1), Some(0));
        assert_eq!(weeks_between(MONDAY, MONDAY + 3 * SECONDS_PER_WEEK), Some(3));
        assert_eq!(weeks_between(MONDAY, MONDAY - 1), None);
    }
}
