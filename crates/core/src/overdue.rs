//! Derived timing signals: overdue flags, durations, and days remaining.
//!
//! These are computed on read from stored timestamps and never persisted.
//! A timeout is purely a reporting signal; nothing here cancels or
//! escalates anything.

use chrono::Duration;

use crate::types::Timestamp;

const SECONDS_PER_DAY: i64 = 86_400;

/// Whether the current step of a running instance has exceeded its timeout.
///
/// True iff `timeout_hours` is positive, the step instance has a start
/// time, and `now` is past `started_at + timeout_hours`.
pub fn step_is_overdue(
    timeout_hours: i32,
    step_started_at: Option<Timestamp>,
    now: Timestamp,
) -> bool {
    if timeout_hours <= 0 {
        return false;
    }
    match step_started_at {
        Some(started) => now > started + Duration::hours(i64::from(timeout_hours)),
        None => false,
    }
}

/// Whether a deadline has passed for a record that is not yet terminal.
pub fn deadline_passed(deadline: Option<Timestamp>, is_terminal: bool, now: Timestamp) -> bool {
    match deadline {
        Some(deadline) if !is_terminal => now > deadline,
        _ => false,
    }
}

/// Signed whole days until `deadline`, floored toward negative infinity.
///
/// Absent when there is no deadline or the record is terminal. A deadline
/// twelve hours in the past yields `-1`.
pub fn days_remaining(deadline: Option<Timestamp>, is_terminal: bool, now: Timestamp) -> Option<i64> {
    match deadline {
        Some(deadline) if !is_terminal => {
            Some((deadline - now).num_seconds().div_euclid(SECONDS_PER_DAY))
        }
        _ => None,
    }
}

/// Elapsed time from `started_at` to `completed_at`, or to `now` while open.
pub fn elapsed(started_at: Timestamp, completed_at: Option<Timestamp>, now: Timestamp) -> Duration {
    completed_at.unwrap_or(now) - started_at
}

/// Step-instance duration: absent until the step has started.
pub fn step_elapsed(
    started_at: Option<Timestamp>,
    completed_at: Option<Timestamp>,
    now: Timestamp,
) -> Option<Duration> {
    started_at.map(|started| elapsed(started, completed_at, now))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn at(hour: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn step_overdue_after_timeout() {
        assert!(step_is_overdue(2, Some(at(8)), at(11)));
        assert!(!step_is_overdue(2, Some(at(8)), at(10)));
    }

    #[test]
    fn step_without_timeout_or_start_is_never_overdue() {
        assert!(!step_is_overdue(0, Some(at(0)), at(23)));
        assert!(!step_is_overdue(-4, Some(at(0)), at(23)));
        assert!(!step_is_overdue(1, None, at(23)));
    }

    #[test]
    fn deadline_passed_only_for_open_records() {
        let now = at(12);
        let yesterday = Some(now - Duration::days(1));
        assert!(deadline_passed(yesterday, false, now));
        assert!(!deadline_passed(yesterday, true, now));
        assert!(!deadline_passed(None, false, now));
        assert!(!deadline_passed(Some(now + Duration::hours(1)), false, now));
    }

    #[test]
    fn days_remaining_floors() {
        let now = at(12);
        assert_eq!(days_remaining(Some(now + Duration::days(3)), false, now), Some(3));
        assert_eq!(
            days_remaining(Some(now + Duration::hours(36)), false, now),
            Some(1)
        );
        assert_eq!(
            days_remaining(Some(now - Duration::hours(12)), false, now),
            Some(-1)
        );
        assert_eq!(days_remaining(Some(now), false, now), Some(0));
    }

    #[test]
    fn days_remaining_absent_when_terminal_or_no_deadline() {
        let now = at(12);
        assert_eq!(days_remaining(Some(now + Duration::days(3)), true, now), None);
        assert_eq!(days_remaining(None, false, now), None);
    }

    #[test]
    fn elapsed_uses_now_while_open() {
        assert_eq!(elapsed(at(1), None, at(4)), Duration::hours(3));
        assert_eq!(elapsed(at(1), Some(at(2)), at(4)), Duration::hours(1));
        assert_eq!(step_elapsed(None, None, at(4)), None);
        assert_eq!(step_elapsed(Some(at(3)), None, at(4)), Some(Duration::hours(1)));
    }
}
