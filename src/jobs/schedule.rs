use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("invalid schedule '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },
    #[error("invalid timezone '{0}'")]
    InvalidTimezone(String),
}

const DAY_NAMES: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

/// Computes the first instant strictly after `reference` at which a job with
/// the given five-field cron expression fires, evaluated in `timezone` and
/// returned in UTC.
///
/// An empty timezone is treated as UTC.
pub fn next_run(
    expression: &str,
    timezone: &str,
    reference: DateTime<Utc>,
) -> Result<DateTime<Utc>, ScheduleError> {
    let tz = parse_timezone(timezone)?;
    let schedule = parse_schedule(expression)?;

    schedule
        .after(&reference.with_timezone(&tz))
        .next()
        .map(|next| next.with_timezone(&Utc))
        .ok_or_else(|| ScheduleError::InvalidSchedule {
            expression: expression.to_string(),
            reason: "schedule never fires".to_string(),
        })
}

/// Validates a schedule/timezone pair without computing anything.
pub fn validate(expression: &str, timezone: &str) -> Result<(), ScheduleError> {
    parse_timezone(timezone)?;
    parse_schedule(expression)?;
    Ok(())
}

fn parse_timezone(timezone: &str) -> Result<Tz, ScheduleError> {
    if timezone.is_empty() {
        return Ok(Tz::UTC);
    }
    timezone
        .parse::<Tz>()
        .map_err(|_| ScheduleError::InvalidTimezone(timezone.to_string()))
}

/// Parses standard cron syntax (minute, hour, day-of-month, month,
/// day-of-week) or an `@hourly`-style descriptor.
///
/// The `cron` crate expects a leading seconds field and numbers days of the
/// week from 1 (Sunday), so the expression is rewritten before parsing.
fn parse_schedule(expression: &str) -> Result<cron::Schedule, ScheduleError> {
    let invalid = |reason: String| ScheduleError::InvalidSchedule {
        expression: expression.to_string(),
        reason,
    };

    let trimmed = expression.trim();
    let normalized = if trimmed.starts_with('@') {
        trimmed.to_string()
    } else {
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        let [minute, hour, day_of_month, month, day_of_week] = fields[..] else {
            return Err(invalid(format!("expected 5 fields, found {}", fields.len())));
        };
        let day_of_week = translate_day_of_week(day_of_week).map_err(invalid)?;
        format!("0 {minute} {hour} {day_of_month} {month} {day_of_week}")
    };

    cron::Schedule::from_str(&normalized).map_err(|e| invalid(e.to_string()))
}

/// Rewrites numeric days of the week (0-7, both 0 and 7 meaning Sunday) into
/// names, leaving wildcards, steps and names untouched.
fn translate_day_of_week(field: &str) -> Result<String, String> {
    field
        .split(',')
        .map(|item| {
            let (range, step) = match item.split_once('/') {
                Some((range, step)) => (range, Some(step)),
                None => (item, None),
            };
            let range = range
                .split('-')
                .map(day_name)
                .collect::<Result<Vec<_>, _>>()?
                .join("-");
            Ok(match step {
                Some(step) => format!("{range}/{step}"),
                None => range,
            })
        })
        .collect::<Result<Vec<_>, String>>()
        .map(|items| items.join(","))
}

fn day_name(bound: &str) -> Result<String, String> {
    if bound.is_empty() || !bound.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(bound.to_string());
    }
    bound
        .parse::<usize>()
        .ok()
        .and_then(|day| DAY_NAMES.get(day))
        .map(|name| (*name).to_string())
        .ok_or_else(|| format!("day of week {bound} out of range 0-7"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike, Weekday};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_every_minute_fires_at_next_minute_boundary() {
        let next = next_run("* * * * *", "UTC", utc(2025, 3, 10, 12, 0, 30)).unwrap();
        assert_eq!(next, utc(2025, 3, 10, 12, 1, 0));
    }

    #[test]
    fn test_result_is_strictly_after_reference() {
        let reference = utc(2025, 3, 10, 12, 1, 0);
        let next = next_run("* * * * *", "UTC", reference).unwrap();
        assert_eq!(next, utc(2025, 3, 10, 12, 2, 0));
    }

    #[test]
    fn test_evaluated_in_job_timezone_and_normalized_to_utc() {
        // 09:00 in New York during EDT is 13:00 UTC
        let next = next_run("0 9 * * *", "America/New_York", utc(2025, 6, 1, 12, 0, 0)).unwrap();
        assert_eq!(next, utc(2025, 6, 1, 13, 0, 0));

        // and 14:00 UTC during EST
        let next = next_run("0 9 * * *", "America/New_York", utc(2025, 1, 15, 15, 0, 0)).unwrap();
        assert_eq!(next, utc(2025, 1, 16, 14, 0, 0));
    }

    #[test]
    fn test_numeric_weekdays_follow_standard_cron() {
        // Friday 2025-03-14 10:00 UTC; weekdays only at 09:00 → Monday
        let next = next_run("0 9 * * 1-5", "UTC", utc(2025, 3, 14, 10, 0, 0)).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!(next.hour(), 9);
        assert_eq!(next.day(), 17);
    }

    #[test]
    fn test_zero_and_seven_both_mean_sunday() {
        let reference = utc(2025, 3, 12, 0, 0, 0); // Wednesday
        let zero = next_run("30 8 * * 0", "UTC", reference).unwrap();
        let seven = next_run("30 8 * * 7", "UTC", reference).unwrap();
        assert_eq!(zero, seven);
        assert_eq!(zero.weekday(), Weekday::Sun);
    }

    #[test]
    fn test_descriptors_are_accepted() {
        let next = next_run("@hourly", "UTC", utc(2025, 3, 10, 12, 15, 0)).unwrap();
        assert_eq!(next, utc(2025, 3, 10, 13, 0, 0));
    }

    #[test]
    fn test_empty_timezone_means_utc() {
        let next = next_run("*/15 * * * *", "", utc(2025, 3, 10, 12, 1, 0)).unwrap();
        assert_eq!(next, utc(2025, 3, 10, 12, 15, 0));
    }

    #[test]
    fn test_unparseable_expression_is_invalid_schedule() {
        let error = next_run("not a cron", "UTC", Utc::now()).unwrap_err();
        assert!(matches!(error, ScheduleError::InvalidSchedule { .. }));

        let error = next_run("61 * * * *", "UTC", Utc::now()).unwrap_err();
        assert!(matches!(error, ScheduleError::InvalidSchedule { .. }));
    }

    #[test]
    fn test_wrong_field_count_is_invalid_schedule() {
        let error = next_run("* * * *", "UTC", Utc::now()).unwrap_err();
        assert!(error.to_string().contains("expected 5 fields, found 4"));

        let error = next_run("0 * * * * *", "UTC", Utc::now()).unwrap_err();
        assert!(matches!(error, ScheduleError::InvalidSchedule { .. }));
    }

    #[test]
    fn test_out_of_range_weekday_is_invalid_schedule() {
        let error = next_run("0 9 * * 8", "UTC", Utc::now()).unwrap_err();
        assert!(matches!(error, ScheduleError::InvalidSchedule { .. }));
    }

    #[test]
    fn test_unknown_timezone_is_invalid_timezone() {
        let error = next_run("* * * * *", "Mars/Olympus", Utc::now()).unwrap_err();
        assert_eq!(
            error,
            ScheduleError::InvalidTimezone("Mars/Olympus".to_string())
        );
    }

    #[test]
    fn test_validate() {
        assert!(validate("*/5 * * * *", "Europe/Warsaw").is_ok());
        assert!(validate("*/5 * * *", "Europe/Warsaw").is_err());
        assert!(validate("*/5 * * * *", "Nowhere").is_err());
    }
}
