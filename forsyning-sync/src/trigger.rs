//! Time-of-day triggers evaluated in a configured time zone.
//!
//! DST handling:
//! - a daily time that does not exist (spring forward) fires at the first
//!   local minute after the gap
//! - a daily time that exists twice (fall back) fires once, at the earlier
//!   instant
//! - the hourly trigger fires on every real instant matching `mm:ss`, so the
//!   repeated hour ticks twice and the skipped hour does not tick

use chrono::{DateTime, Days, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::time::Duration;

/// Longest DST gap searched when skipping a non-existent local time.
const MAX_GAP_MINUTES: i64 = 3 * 60;

/// When a scheduled task fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeTrigger {
    /// Once a day at a local time.
    Daily(NaiveTime),
    /// Every hour at `minute:second` local time.
    Hourly {
        /// Minute past the hour.
        minute: u32,
        /// Second past the minute.
        second: u32,
    },
    /// A fixed interval after the previous fire.
    Every(Duration),
}

impl TimeTrigger {
    /// Daily trigger at `hour:minute:second`; `None` if out of range.
    pub fn daily(hour: u32, minute: u32, second: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, second).map(Self::Daily)
    }

    /// Daily trigger at 00:00:00.
    pub fn midnight() -> Self {
        Self::Daily(NaiveTime::MIN)
    }

    /// Hourly trigger at mm:ss = 00:00.
    pub fn top_of_hour() -> Self {
        Self::Hourly {
            minute: 0,
            second: 0,
        }
    }

    /// Returns the first fire instant strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
        let next = match *self {
            Self::Daily(time) => next_daily(time, after, tz),
            Self::Hourly { minute, second } => next_hourly(minute, second, after, tz),
            Self::Every(interval) => chrono::Duration::from_std(interval)
                .ok()
                .and_then(|d| after.checked_add_signed(d)),
        };
        // Every search above terminates within two days; the fallback only
        // covers dates at the edge of chrono's range.
        next.unwrap_or_else(|| after + chrono::Duration::hours(1))
    }
}

impl fmt::Display for TimeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily(time) => write!(f, "daily at {}", time.format("%H:%M:%S")),
            Self::Hourly { minute, second } => write!(f, "hourly at xx:{minute:02}:{second:02}"),
            Self::Every(interval) => write!(f, "every {}s", interval.as_secs()),
        }
    }
}

fn next_daily(time: NaiveTime, after: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
    let today = after.with_timezone(&tz).date_naive();
    (0..=2)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .filter_map(|date| resolve_earliest_or_after_gap(tz, date.and_time(time)))
        .find(|at| *at > after)
}

fn resolve_earliest_or_after_gap(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    (0..=MAX_GAP_MINUTES)
        .map(|m| naive + chrono::Duration::minutes(m))
        .find_map(|candidate| tz.from_local_datetime(&candidate).earliest())
        .map(|local| local.with_timezone(&Utc))
}

fn next_hourly(minute: u32, second: u32, after: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
    let local = after.with_timezone(&tz).naive_local();
    let start = local.date().and_hms_opt(local.hour(), minute, second)?;

    (0..=48)
        .map(|h| start + chrono::Duration::hours(h))
        .find_map(|naive| match tz.from_local_datetime(&naive) {
            LocalResult::Single(at) => Some(at.with_timezone(&Utc)).filter(|t| *t > after),
            LocalResult::Ambiguous(first, second) => [first, second]
                .into_iter()
                .map(|t| t.with_timezone(&Utc))
                .find(|t| *t > after),
            LocalResult::None => None,
        })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Copenhagen;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_daily_later_today_and_tomorrow() {
        let trigger = TimeTrigger::daily(13, 7, 42).unwrap();

        // 10:00 CEST -> 13:07:42 CEST the same day
        let next = trigger.next_after(utc(2024, 5, 1, 8, 0, 0), Copenhagen);
        assert_eq!(next, utc(2024, 5, 1, 11, 7, 42));

        // Exactly at fire time -> next day
        let next = trigger.next_after(next, Copenhagen);
        assert_eq!(next, utc(2024, 5, 2, 11, 7, 42));
    }

    #[test]
    fn test_midnight_uses_local_date() {
        // 23:59 CEST is 21:59 UTC; local midnight is 22:00 UTC.
        let next = TimeTrigger::midnight().next_after(utc(2024, 5, 1, 21, 59, 0), Copenhagen);
        assert_eq!(next, utc(2024, 5, 1, 22, 0, 0));

        // Winter: CET is UTC+1.
        let next = TimeTrigger::midnight().next_after(utc(2024, 1, 10, 12, 0, 0), Copenhagen);
        assert_eq!(next, utc(2024, 1, 10, 23, 0, 0));
    }

    #[test]
    fn test_daily_in_spring_gap_skips_forward() {
        // 2024-03-31 02:00 CET jumps to 03:00 CEST; 02:30 does not exist.
        let trigger = TimeTrigger::daily(2, 30, 0).unwrap();
        let next = trigger.next_after(utc(2024, 3, 30, 23, 0, 0), Copenhagen);
        assert_eq!(next, utc(2024, 3, 31, 1, 0, 0));
    }

    #[test]
    fn test_daily_in_autumn_overlap_fires_once() {
        // 2024-10-27 03:00 CEST falls back to 02:00 CET; 02:30 happens twice.
        let trigger = TimeTrigger::daily(2, 30, 0).unwrap();
        let first = trigger.next_after(utc(2024, 10, 26, 22, 0, 0), Copenhagen);
        assert_eq!(first, utc(2024, 10, 27, 0, 30, 0));

        let second = trigger.next_after(first, Copenhagen);
        assert_eq!(second, utc(2024, 10, 28, 1, 30, 0));
    }

    #[test]
    fn test_hourly() {
        let trigger = TimeTrigger::top_of_hour();
        assert_eq!(
            trigger.next_after(utc(2024, 5, 1, 8, 15, 0), Copenhagen),
            utc(2024, 5, 1, 9, 0, 0)
        );
        assert_eq!(
            trigger.next_after(utc(2024, 5, 1, 9, 0, 0), Copenhagen),
            utc(2024, 5, 1, 10, 0, 0)
        );
    }

    #[test]
    fn test_hourly_ticks_through_repeated_hour() {
        let trigger = TimeTrigger::top_of_hour();
        let mut at = utc(2024, 10, 26, 23, 30, 0);
        let mut ticks = Vec::new();
        for _ in 0..4 {
            at = trigger.next_after(at, Copenhagen);
            ticks.push(at);
        }
        // 02:00 CEST, 02:00 CET, 03:00 CET, 04:00 CET
        assert_eq!(
            ticks,
            vec![
                utc(2024, 10, 27, 0, 0, 0),
                utc(2024, 10, 27, 1, 0, 0),
                utc(2024, 10, 27, 2, 0, 0),
                utc(2024, 10, 27, 3, 0, 0),
            ]
        );
    }

    #[test]
    fn test_every() {
        let trigger = TimeTrigger::Every(Duration::from_secs(9 * 3600));
        assert_eq!(
            trigger.next_after(utc(2024, 5, 1, 0, 0, 0), Copenhagen),
            utc(2024, 5, 1, 9, 0, 0)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(TimeTrigger::daily(13, 5, 9).unwrap().to_string(), "daily at 13:05:09");
        assert_eq!(TimeTrigger::top_of_hour().to_string(), "hourly at xx:00:00");
    }
}
