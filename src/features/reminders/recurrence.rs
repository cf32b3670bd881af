//! # Recurrence Specs
//!
//! Five-field cron subset used by recurring reminders:
//! `minute hour day-of-month month day-of-week`. Each field is `*`, a fixed
//! value, or a `*/N` step. Lists and ranges are not part of the grammar, so any
//! consumer only has to understand these three forms.
//!
//! Day-of-week counts from Monday (`0`) to Sunday (`6`).
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.1.0
//!
//! ## Changelog
//! - 1.1.0: `next_after` so the dispatch loop can advance recurring reminders
//! - 1.0.0: Parsing and constructors for the generated expressions

use anyhow::{anyhow, bail, Result};
use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How far ahead `next_after` searches before giving up (covers leap days).
const MAX_SEARCH_DAYS: i64 = 5 * 366;

const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// A single cron field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CronField {
    /// `*`
    Any,
    /// A fixed value
    Value(u32),
    /// `*/N`, counted from the first value of the field's range
    Step(u32),
}

impl CronField {
    fn parse(raw: &str, name: &str, min: u32, max: u32) -> Result<Self> {
        if raw == "*" {
            return Ok(CronField::Any);
        }

        if let Some(step) = raw.strip_prefix("*/") {
            let step: u32 = step
                .parse()
                .map_err(|_| anyhow!("Invalid step in {name} field: {raw}"))?;
            if step == 0 {
                bail!("Step in {name} field must be positive: {raw}");
            }
            return Ok(CronField::Step(step));
        }

        let value: u32 = raw
            .parse()
            .map_err(|_| anyhow!("Unsupported {name} field: {raw}"))?;
        if value < min || value > max {
            bail!("{name} field out of range {min}-{max}: {value}");
        }
        Ok(CronField::Value(value))
    }

    fn matches(&self, value: u32, min: u32) -> bool {
        match self {
            CronField::Any => true,
            CronField::Value(expected) => *expected == value,
            CronField::Step(step) => value >= min && (value - min) % step == 0,
        }
    }

    fn is_restricted(&self) -> bool {
        !matches!(self, CronField::Any)
    }
}

impl fmt::Display for CronField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CronField::Any => write!(f, "*"),
            CronField::Value(value) => write!(f, "{value}"),
            CronField::Step(step) => write!(f, "*/{step}"),
        }
    }
}

/// Recurrence expression attached to every recurring reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecurrenceSpec {
    pub minute: CronField,
    pub hour: CronField,
    pub day_of_month: CronField,
    pub month: CronField,
    pub day_of_week: CronField,
}

impl RecurrenceSpec {
    /// `{minute} {hour} * * *`
    pub fn daily(hour: u32, minute: u32) -> Self {
        Self {
            minute: CronField::Value(minute),
            hour: CronField::Value(hour),
            day_of_month: CronField::Any,
            month: CronField::Any,
            day_of_week: CronField::Any,
        }
    }

    /// `{minute} {hour} * * {weekday}` with Monday = 0
    pub fn weekly(weekday: u32, hour: u32, minute: u32) -> Self {
        Self {
            day_of_week: CronField::Value(weekday),
            ..Self::daily(hour, minute)
        }
    }

    /// `{minute} {hour} */{days} * *`
    pub fn every_n_days(days: u32, hour: u32, minute: u32) -> Self {
        Self {
            day_of_month: CronField::Step(days),
            ..Self::daily(hour, minute)
        }
    }

    /// `0 */{hours} * * *`
    pub fn every_n_hours(hours: u32) -> Self {
        Self {
            minute: CronField::Value(0),
            hour: CronField::Step(hours),
            day_of_month: CronField::Any,
            month: CronField::Any,
            day_of_week: CronField::Any,
        }
    }

    /// `*/{minutes} * * * *`
    pub fn every_n_minutes(minutes: u32) -> Self {
        Self {
            minute: CronField::Step(minutes),
            hour: CronField::Any,
            day_of_month: CronField::Any,
            month: CronField::Any,
            day_of_week: CronField::Any,
        }
    }

    /// First wall-clock minute strictly after `after` that matches every field.
    ///
    /// Returns `None` when nothing matches within the search horizon (e.g. `0 9 30 2 *`).
    pub fn next_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        let start = after
            .with_second(0)?
            .with_nanosecond(0)?
            .checked_add_signed(Duration::minutes(1))?;
        let last_day = start.date().checked_add_signed(Duration::days(MAX_SEARCH_DAYS))?;

        let mut day = start.date();
        while day <= last_day {
            if self.day_matches(day) {
                let from = if day == start.date() {
                    start.time()
                } else {
                    NaiveTime::MIN
                };
                if let Some(time) = self.first_time_from(from) {
                    return Some(day.and_time(time));
                }
            }
            day = day.succ_opt()?;
        }

        None
    }

    fn day_matches(&self, day: chrono::NaiveDate) -> bool {
        if !self.month.matches(day.month(), 1) {
            return false;
        }

        let dom = self.day_of_month.matches(day.day(), 1);
        let dow = self
            .day_of_week
            .matches(day.weekday().num_days_from_monday(), 0);

        // Cron convention: when both day fields are restricted either one may match
        if self.day_of_month.is_restricted() && self.day_of_week.is_restricted() {
            dom || dow
        } else {
            dom && dow
        }
    }

    fn first_time_from(&self, from: NaiveTime) -> Option<NaiveTime> {
        for hour in from.hour()..24 {
            if !self.hour.matches(hour, 0) {
                continue;
            }
            let first_minute = if hour == from.hour() { from.minute() } else { 0 };
            for minute in first_minute..60 {
                if self.minute.matches(minute, 0) {
                    return NaiveTime::from_hms_opt(hour, minute, 0);
                }
            }
        }
        None
    }

    /// Human readable summary used in reminder listings
    pub fn describe(&self) -> String {
        use CronField::*;

        match (
            self.minute,
            self.hour,
            self.day_of_month,
            self.month,
            self.day_of_week,
        ) {
            (Value(m), Value(h), Any, Any, Any) => format!("every day at {h:02}:{m:02}"),
            (Value(m), Value(h), Any, Any, Value(d)) if d < 7 => {
                format!("every {} at {h:02}:{m:02}", WEEKDAY_NAMES[d as usize])
            }
            (Value(m), Value(h), Step(n), Any, Any) => {
                format!("every {n} days at {h:02}:{m:02}")
            }
            (Value(0), Step(n), Any, Any, Any) => format!("every {n} hours"),
            (Step(n), Any, Any, Any, Any) => format!("every {n} minutes"),
            _ => format!("cron `{self}`"),
        }
    }
}

impl fmt::Display for RecurrenceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.minute, self.hour, self.day_of_month, self.month, self.day_of_week
        )
    }
}

impl FromStr for RecurrenceSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() != 5 {
            bail!(
                "Recurrence spec needs 5 fields, got {}: {s}",
                fields.len()
            );
        }

        Ok(Self {
            minute: CronField::parse(fields[0], "minute", 0, 59)?,
            hour: CronField::parse(fields[1], "hour", 0, 23)?,
            day_of_month: CronField::parse(fields[2], "day-of-month", 1, 31)?,
            month: CronField::parse(fields[3], "month", 1, 12)?,
            day_of_week: CronField::parse(fields[4], "day-of-week", 0, 6)?,
        })
    }
}

impl TryFrom<String> for RecurrenceSpec {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RecurrenceSpec> for String {
    fn from(spec: RecurrenceSpec) -> Self {
        spec.to_string()
    }
}
