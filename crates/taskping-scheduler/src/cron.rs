//! Lightweight cron expression parser.
//! Supports: "MIN HOUR DOM MON DOW" (5-field, no seconds)
//! Field syntax: *, */N, N, A-B, A-B/N and comma lists of those.
//! Day of week: 0-6 with 0 = Sunday (7 is accepted as Sunday too).
//! Example: "0 8 * * *" = every day at 8:00, "0 20 * * 0" = Sundays at 20:00.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike};

use taskping_core::error::{Result, TaskPingError};

/// How far ahead `next_after` searches before giving up (covers leap-day schedules).
const SEARCH_HORIZON_DAYS: i64 = 366 * 8;

/// A parsed cron schedule. Each field is a bitmask of allowed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSpec {
    expression: String,
    minutes: u64,
    hours: u32,
    days_of_month: u32,
    months: u16,
    days_of_week: u8,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronSpec {
    /// Every day at `hour:minute`.
    pub fn daily_at(hour: u32, minute: u32) -> Self {
        Self::build(format!("{minute} {hour} * * *"), minute, hour, None)
    }

    /// Every week on `weekday` (0 = Sunday) at `hour:minute`.
    pub fn weekly_at(weekday: u32, hour: u32, minute: u32) -> Self {
        Self::build(
            format!("{minute} {hour} * * {weekday}"),
            minute,
            hour,
            Some(weekday % 7),
        )
    }

    fn build(expression: String, minute: u32, hour: u32, weekday: Option<u32>) -> Self {
        Self {
            expression,
            minutes: 1u64 << (minute % 60),
            hours: 1u32 << (hour % 24),
            days_of_month: mask_range(1, 31) as u32,
            months: mask_range(1, 12) as u16,
            days_of_week: weekday.map_or(mask_range(0, 6) as u8, |d| 1u8 << d),
            dom_restricted: false,
            dow_restricted: weekday.is_some(),
        }
    }

    pub fn parse(expression: &str) -> Result<Self> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(TaskPingError::Scheduler(format!(
                "Invalid cron expression: '{expression}' (need 5 fields: MIN HOUR DOM MON DOW)"
            )));
        }

        let invalid = |name: &str, field: &str| {
            TaskPingError::Scheduler(format!("Invalid cron {name} field '{field}' in '{expression}'"))
        };

        let minutes = parse_field(parts[0], 0, 59).ok_or_else(|| invalid("minute", parts[0]))?;
        let hours = parse_field(parts[1], 0, 23).ok_or_else(|| invalid("hour", parts[1]))?;
        let dom = parse_field(parts[2], 1, 31).ok_or_else(|| invalid("day-of-month", parts[2]))?;
        let months = parse_field(parts[3], 1, 12).ok_or_else(|| invalid("month", parts[3]))?;
        let mut dow = parse_field(parts[4], 0, 7).ok_or_else(|| invalid("day-of-week", parts[4]))?;
        // 7 is an alias for Sunday.
        if dow & (1 << 7) != 0 {
            dow = (dow & !(1 << 7)) | 1;
        }

        Ok(Self {
            expression: parts.join(" "),
            minutes,
            hours: hours as u32,
            days_of_month: dom as u32,
            months: months as u16,
            days_of_week: dow as u8,
            dom_restricted: parts[2] != "*",
            dow_restricted: parts[4] != "*",
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The first matching minute strictly after `after`, in `after`'s time zone.
    ///
    /// Local times skipped by a DST jump are passed over; ambiguous local
    /// times resolve to the earlier instant.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let start = after.naive_local().with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let horizon = start + Duration::days(SEARCH_HORIZON_DAYS);
        let mut t = start;

        while t <= horizon {
            if !self.month_matches(t.month()) {
                t = first_of_next_month(t.date())?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.day_matches(t.date()) {
                t = t.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if self.hours & (1 << t.hour()) == 0 {
                t = next_hour(t)?;
                continue;
            }
            if self.minutes & (1 << t.minute()) == 0 {
                t += Duration::minutes(1);
                continue;
            }
            match tz.from_local_datetime(&t) {
                LocalResult::Single(dt) if dt > *after => return Some(dt),
                LocalResult::Ambiguous(early, late) => {
                    if early > *after {
                        return Some(early);
                    }
                    if late > *after {
                        return Some(late);
                    }
                }
                _ => {}
            }
            t += Duration::minutes(1);
        }

        None
    }

    fn month_matches(&self, month: u32) -> bool {
        self.months & (1 << month) != 0
    }

    /// Standard cron rule: when both day fields are restricted, either may match.
    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = self.days_of_month & (1 << date.day()) != 0;
        let dow = self.days_of_week & (1 << date.weekday().num_days_from_sunday()) != 0;
        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }
}

impl FromStr for CronSpec {
    type Err = TaskPingError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CronSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn mask_range(min: u32, max: u32) -> u64 {
    (min..=max).fold(0u64, |m, v| m | (1 << v))
}

/// Parse a cron field into a bitmask of matching values.
fn parse_field(field: &str, min: u32, max: u32) -> Option<u64> {
    let mut mask = 0u64;
    for part in field.split(',') {
        mask |= parse_part(part.trim(), min, max)?;
    }
    (mask != 0).then_some(mask)
}

fn parse_part(part: &str, min: u32, max: u32) -> Option<u64> {
    let (range, step) = match part.split_once('/') {
        Some((range, step)) => {
            let n: u32 = step.parse().ok()?;
            if n == 0 {
                return None;
            }
            (range, n)
        }
        None => (part, 1),
    };

    let (lo, hi) = if range == "*" {
        (min, max)
    } else if let Some((a, b)) = range.split_once('-') {
        (a.parse().ok()?, b.parse().ok()?)
    } else {
        let n: u32 = range.parse().ok()?;
        // "N/step" means "from N to the end, every step".
        if step > 1 { (n, max) } else { (n, n) }
    };

    if lo < min || hi > max || lo > hi {
        return None;
    }
    Some((lo..=hi).step_by(step as usize).fold(0u64, |m, v| m | (1 << v)))
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

fn next_hour(t: NaiveDateTime) -> Option<NaiveDateTime> {
    Some(t.date().and_hms_opt(t.hour(), 0, 0)? + Duration::hours(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc, Weekday};

    #[test]
    fn test_every_hour() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 10, 30, 0).unwrap();
        let next = CronSpec::parse("0 * * * *").unwrap().next_after(&after).unwrap();
        assert_eq!(next.hour(), 11);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn test_specific_time() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 7, 0, 0).unwrap();
        let next = CronSpec::parse("0 8 * * *").unwrap().next_after(&after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 22, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_specific_time_rolls_to_tomorrow() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 9, 0, 0).unwrap();
        let next = CronSpec::daily_at(9, 0).next_after(&after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 23, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_every_15_minutes() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 10, 2, 0).unwrap();
        let spec: CronSpec = "*/15 * * * *".parse().unwrap();
        let next = spec.next_after(&after).unwrap();
        assert_eq!(next.minute(), 15);
    }

    #[test]
    fn test_weekly_sunday_evening() {
        // 2026-02-18 is a Wednesday.
        let after = Utc.with_ymd_and_hms(2026, 2, 18, 12, 0, 0).unwrap();
        let spec: CronSpec = "0 20 * * 0".parse().unwrap();
        let next = spec.next_after(&after).unwrap();
        assert_eq!(next.weekday(), Weekday::Sun);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 22, 20, 0, 0).unwrap());
        assert_eq!(CronSpec::weekly_at(0, 20, 0).next_after(&after), Some(next));
    }

    #[test]
    fn test_seven_is_sunday() {
        let after = Utc.with_ymd_and_hms(2026, 2, 18, 12, 0, 0).unwrap();
        let a = CronSpec::parse("0 20 * * 7").unwrap().next_after(&after);
        let b = CronSpec::parse("0 20 * * 0").unwrap().next_after(&after);
        assert_eq!(a, b);
    }

    #[test]
    fn test_ranges_and_lists() {
        let spec = CronSpec::parse("0,30 9-17/4 * * 1-5").unwrap();
        // Saturday 2026-02-21 → next is Monday 09:00.
        let after = Utc.with_ymd_and_hms(2026, 2, 21, 8, 0, 0).unwrap();
        let next = spec.next_after(&after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 23, 9, 0, 0).unwrap());
        let next = spec.next_after(&next).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 23, 9, 30, 0).unwrap());
        let next = spec.next_after(&next).unwrap();
        assert_eq!(next.hour(), 13);
    }

    #[test]
    fn test_month_rollover() {
        let spec = CronSpec::parse("0 0 1 * *").unwrap();
        let after = Utc.with_ymd_and_hms(2026, 12, 15, 0, 0, 0).unwrap();
        assert_eq!(
            spec.next_after(&after).unwrap(),
            Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_impossible_date_never_fires() {
        let spec = CronSpec::parse("0 0 30 2 *").unwrap();
        assert!(spec.next_after(&Utc::now()).is_none());
    }

    #[test]
    fn test_invalid_expression() {
        assert!(CronSpec::parse("bad").is_err());
        assert!("0 8 * *".parse::<CronSpec>().is_err());
        assert!(CronSpec::parse("61 * * * *").is_err());
        assert!(CronSpec::parse("*/0 * * * *").is_err());
        assert!(CronSpec::parse("0 5-2 * * *").is_err());
        assert!(CronSpec::parse("0 0 0 * *").is_err());
    }

    /// UTC+0 in winter, UTC+1 from 2026-03-29 01:00 UTC to 2026-10-25 01:00 UTC.
    #[derive(Debug, Clone, Copy)]
    struct SummerTime;

    impl SummerTime {
        fn spring() -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2026, 3, 29).unwrap().and_hms_opt(1, 0, 0).unwrap()
        }

        fn autumn() -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2026, 10, 25).unwrap().and_hms_opt(1, 0, 0).unwrap()
        }

        fn winter() -> FixedOffset {
            FixedOffset::east_opt(0).unwrap()
        }

        fn summer() -> FixedOffset {
            FixedOffset::east_opt(3600).unwrap()
        }
    }

    impl TimeZone for SummerTime {
        type Offset = FixedOffset;

        fn from_offset(_offset: &FixedOffset) -> Self {
            SummerTime
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let hour = Duration::hours(1);
            if *local >= Self::spring() && *local < Self::spring() + hour {
                LocalResult::None
            } else if *local >= Self::autumn() && *local < Self::autumn() + hour {
                LocalResult::Ambiguous(Self::summer(), Self::winter())
            } else if *local >= Self::spring() + hour && *local < Self::autumn() {
                LocalResult::Single(Self::summer())
            } else {
                LocalResult::Single(Self::winter())
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            if *utc >= Self::spring() && *utc < Self::autumn() {
                Self::summer()
            } else {
                Self::winter()
            }
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn test_time_skipped_by_dst_jump_is_passed_over() {
        let spec = CronSpec::daily_at(1, 30);
        let after = SummerTime.with_ymd_and_hms(2026, 3, 28, 12, 0, 0).unwrap();

        // 01:30 does not exist on 2026-03-29.
        let next = spec.next_after(&after).unwrap();
        assert_eq!(next.naive_local(), utc(2026, 3, 30, 1, 30));
        assert_eq!(next.naive_utc(), utc(2026, 3, 30, 0, 30));
    }

    #[test]
    fn test_ambiguous_time_resolves_to_earliest_instant_after_reference() {
        let spec = CronSpec::daily_at(1, 30);
        let after = SummerTime.with_ymd_and_hms(2026, 10, 24, 12, 0, 0).unwrap();

        let first = spec.next_after(&after).unwrap();
        assert_eq!(first.naive_local(), utc(2026, 10, 25, 1, 30));
        assert_eq!(first.naive_utc(), utc(2026, 10, 25, 0, 30));

        // Having fired on the first pass, the repeated hour does not fire again.
        let next = spec.next_after(&first).unwrap();
        assert_eq!(next.naive_utc(), utc(2026, 10, 26, 1, 30));

        // A reference inside the repeated hour picks the later instant.
        let inside = SummerTime.from_utc_datetime(&utc(2026, 10, 25, 1, 0));
        let late = spec.next_after(&inside).unwrap();
        assert_eq!(late.naive_utc(), utc(2026, 10, 25, 1, 30));
    }

    #[test]
    fn test_display_keeps_expression() {
        assert_eq!(CronSpec::daily_at(18, 0).to_string(), "0 18 * * *");
        assert_eq!(CronSpec::parse("0  9 * *  *").unwrap().expression(), "0 9 * * *");
    }
}
