//! Cron-based scheduling for recurring cadences
//!
//! Expressions use the classic 5-field layout
//! `minute hour day-of-month month day-of-week`, evaluated in UTC. Each field
//! accepts `*`, `*/n`, `a`, `a-b`, `a-b/n` and comma lists; months and
//! weekdays also accept three-letter names. When both day fields are
//! restricted a day matches if either does.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Cron expression parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CronParseError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),

    #[error("invalid {field} field '{value}': {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: String,
    },
}

const MONTH_NAMES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEKDAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Horizon searched for the next match (covers a leap day)
const SEARCH_HORIZON_DAYS: i64 = 366 * 4 + 1;

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    names_start: u32,
}

const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
    names_start: 0,
};
const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
    names_start: 0,
};
const DAY_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
    names_start: 0,
};
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: &MONTH_NAMES,
    names_start: 1,
};
// 7 is accepted as an alias for Sunday and folded onto 0
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: &WEEKDAY_NAMES,
    names_start: 0,
};

/// Parsed 5-field cron expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronExpression {
    /// Parse an expression such as `0 */4 * * *` or `@hourly`
    pub fn parse(expression: &str) -> Result<Self, CronParseError> {
        let source = expression.trim();
        let expanded = match source {
            "@hourly" => "0 * * * *",
            "@daily" | "@midnight" => "0 0 * * *",
            "@weekly" => "0 0 * * 0",
            "@monthly" => "0 0 1 * *",
            "@yearly" | "@annually" => "0 0 1 1 *",
            other => other,
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronParseError::FieldCount(fields.len()));
        }

        let mut days_of_week = parse_field(fields[4], DAY_OF_WEEK)?;
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Self {
            source: source.to_string(),
            minutes: parse_field(fields[0], MINUTE)?,
            hours: parse_field(fields[1], HOUR)?,
            days_of_month: parse_field(fields[2], DAY_OF_MONTH)?,
            months: parse_field(fields[3], MONTH)?,
            days_of_week,
            dom_restricted: !fields[2].starts_with('*'),
            dow_restricted: !fields[4].starts_with('*'),
        })
    }

    /// The expression as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// First matching minute strictly after `from`
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = from.naive_utc().with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let limit = start + Duration::days(SEARCH_HORIZON_DAYS);
        let mut t = start;

        while t <= limit {
            if !has_bit(self.months, t.month()) {
                t = first_of_next_month(t)?;
                continue;
            }
            if !self.day_matches(t) {
                t = (t.date() + Duration::days(1)).and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !has_bit(self.hours, t.hour()) {
                t = t.with_minute(0)? + Duration::hours(1);
                continue;
            }
            if !has_bit(self.minutes, t.minute()) {
                t += Duration::minutes(1);
                continue;
            }
            return Some(DateTime::from_naive_utc_and_offset(t, Utc));
        }

        None
    }

    fn day_matches(&self, t: NaiveDateTime) -> bool {
        let dom = has_bit(self.days_of_month, t.day());
        let dow = has_bit(self.days_of_week, t.weekday().num_days_from_sunday());
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }
}

impl FromStr for CronExpression {
    type Err = CronParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn has_bit(set: u64, value: u32) -> bool {
    set & (1u64 << value) != 0
}

fn first_of_next_month(t: NaiveDateTime) -> Option<NaiveDateTime> {
    let (year, month) = if t.month() == 12 {
        (t.year() + 1, 1)
    } else {
        (t.year(), t.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)
}

fn parse_field(value: &str, spec: FieldSpec) -> Result<u64, CronParseError> {
    let invalid = |reason: String| CronParseError::InvalidField {
        field: spec.name,
        value: value.to_string(),
        reason,
    };

    let mut set = 0u64;
    for part in value.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| invalid(format!("bad step '{}'", step)))?;
                if step == 0 {
                    return Err(invalid("step must be > 0".to_string()));
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (start, end) = if range == "*" {
            (spec.min, spec.max)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_value(a, spec).map_err(&invalid)?, parse_value(b, spec).map_err(&invalid)?)
        } else {
            let a = parse_value(range, spec).map_err(&invalid)?;
            // `a/n` means "from a to the end, every n"
            (a, if step.is_some() { spec.max } else { a })
        };

        if start > end {
            return Err(invalid(format!("range {}-{} is reversed", start, end)));
        }

        let step = step.unwrap_or(1) as usize;
        for v in (start..=end).step_by(step) {
            set |= 1u64 << v;
        }
    }

    Ok(set)
}

fn parse_value(token: &str, spec: FieldSpec) -> Result<u32, String> {
    let upper = token.to_ascii_uppercase();
    let value = match spec.names.iter().position(|n| *n == upper) {
        Some(index) => index as u32 + spec.names_start,
        None => token
            .parse::<u32>()
            .map_err(|_| format!("'{}' is not a number", token))?,
    };

    if value < spec.min || value > spec.max {
        return Err(format!(
            "{} is outside {}..={}",
            value, spec.min, spec.max
        ));
    }
    Ok(value)
}

/// Schedule expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleExpression {
    /// Calendar schedule
    Cron(CronExpression),
    /// Fixed interval measured from the previous occurrence
    Interval(Duration),
}

impl ScheduleExpression {
    /// Calculate next occurrence from a given time
    pub fn next_occurrence(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ScheduleExpression::Cron(cron) => cron.next_after(from),
            ScheduleExpression::Interval(duration) => Some(from + *duration),
        }
    }
}

impl fmt::Display for ScheduleExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleExpression::Cron(cron) => write!(f, "{}", cron),
            ScheduleExpression::Interval(d) => write!(f, "every {}ms", d.num_milliseconds()),
        }
    }
}

/// Named schedule
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Schedule name
    pub name: String,
    /// Schedule expression
    pub expression: ScheduleExpression,
}

impl Schedule {
    /// Create a new schedule
    pub fn new(name: impl Into<String>, expression: ScheduleExpression) -> Self {
        Self {
            name: name.into(),
            expression,
        }
    }

    /// Create a schedule from a cron expression string
    pub fn cron(name: impl Into<String>, expression: &str) -> Result<Self, CronParseError> {
        Ok(Self::new(
            name,
            ScheduleExpression::Cron(CronExpression::parse(expression)?),
        ))
    }

    /// Next occurrence after `now` and how long to wait for it
    pub fn next_run(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, std::time::Duration)> {
        let next = self.expression.next_occurrence(now)?;
        let wait = (next - now).to_std().unwrap_or_default();
        Some((next, wait))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_hourly_on_the_hour() {
        let cron = CronExpression::parse("0 * * * *").unwrap();
        assert_eq!(cron.next_after(at(2024, 3, 1, 10, 17)), Some(at(2024, 3, 1, 11, 0)));
        // Strictly after: an exact match moves to the next hour
        assert_eq!(cron.next_after(at(2024, 3, 1, 11, 0)), Some(at(2024, 3, 1, 12, 0)));
    }

    #[test]
    fn test_every_four_hours() {
        let cron = CronExpression::parse("0 */4 * * *").unwrap();
        assert_eq!(cron.next_after(at(2024, 3, 1, 10, 17)), Some(at(2024, 3, 1, 12, 0)));
        assert_eq!(cron.next_after(at(2024, 3, 1, 21, 0)), Some(at(2024, 3, 2, 0, 0)));
        assert_eq!(cron.next_after(at(2024, 12, 31, 23, 59)), Some(at(2025, 1, 1, 0, 0)));
    }

    #[test]
    fn test_ranges_lists_and_steps() {
        let cron = CronExpression::parse("15,45 9-17/2 * * *").unwrap();
        assert_eq!(cron.next_after(at(2024, 3, 1, 8, 0)), Some(at(2024, 3, 1, 9, 15)));
        assert_eq!(cron.next_after(at(2024, 3, 1, 9, 45)), Some(at(2024, 3, 1, 11, 15)));
        assert_eq!(cron.next_after(at(2024, 3, 1, 17, 45)), Some(at(2024, 3, 2, 9, 15)));
    }

    #[test]
    fn test_day_fields_combine_with_or() {
        // 13th of the month or any Friday
        let cron = CronExpression::parse("0 0 13 * FRI").unwrap();
        // 2024-03-01 is a Friday
        assert_eq!(cron.next_after(at(2024, 2, 29, 12, 0)), Some(at(2024, 3, 1, 0, 0)));
        assert_eq!(cron.next_after(at(2024, 3, 1, 0, 0)), Some(at(2024, 3, 8, 0, 0)));
        assert_eq!(cron.next_after(at(2024, 3, 8, 0, 0)), Some(at(2024, 3, 13, 0, 0)));
        assert_eq!(cron.next_after(at(2024, 3, 13, 0, 0)), Some(at(2024, 3, 15, 0, 0)));
    }

    #[test]
    fn test_sunday_alias_and_names() {
        let a = CronExpression::parse("0 0 * * 7").unwrap();
        let b = CronExpression::parse("0 0 * * sun").unwrap();
        // 2024-03-03 is a Sunday
        assert_eq!(a.next_after(at(2024, 3, 1, 0, 0)), Some(at(2024, 3, 3, 0, 0)));
        assert_eq!(b.next_after(at(2024, 3, 1, 0, 0)), Some(at(2024, 3, 3, 0, 0)));

        let feb = CronExpression::parse("30 6 1 feb *").unwrap();
        assert_eq!(feb.next_after(at(2024, 3, 1, 0, 0)), Some(at(2025, 2, 1, 6, 30)));
    }

    #[test]
    fn test_leap_day() {
        let cron = CronExpression::parse("0 0 29 2 *").unwrap();
        assert_eq!(cron.next_after(at(2024, 3, 1, 0, 0)), Some(at(2028, 2, 29, 0, 0)));
    }

    #[test]
    fn test_impossible_date_has_no_occurrence() {
        let cron = CronExpression::parse("0 0 31 2 *").unwrap();
        assert_eq!(cron.next_after(at(2024, 1, 1, 0, 0)), None);
    }

    #[test]
    fn test_aliases() {
        let hourly = CronExpression::parse("@hourly").unwrap();
        assert_eq!(hourly.as_str(), "@hourly");
        assert_eq!(hourly.next_after(at(2024, 3, 1, 10, 17)), Some(at(2024, 3, 1, 11, 0)));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            CronExpression::parse("0 * * *"),
            Err(CronParseError::FieldCount(4))
        );
        assert!(CronExpression::parse("60 * * * *").is_err());
        assert!(CronExpression::parse("0 */0 * * *").is_err());
        assert!(CronExpression::parse("0 5-2 * * *").is_err());
        assert!(CronExpression::parse("0 * * foo *").is_err());
    }

    #[test]
    fn test_schedule_next_run() {
        let schedule = Schedule::cron("hourly", "0 * * * *").unwrap();
        let (next, wait) = schedule.next_run(at(2024, 3, 1, 10, 30)).unwrap();
        assert_eq!(next, at(2024, 3, 1, 11, 0));
        assert_eq!(wait, std::time::Duration::from_secs(30 * 60));

        let interval = Schedule::new(
            "fast",
            ScheduleExpression::Interval(Duration::milliseconds(50)),
        );
        let (_, wait) = interval.next_run(Utc::now()).unwrap();
        assert_eq!(wait, std::time::Duration::from_millis(50));
    }
}
