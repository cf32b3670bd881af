//! Free-form calendar phrases ("dentist tomorrow at noon", "march 3rd 5pm",
//! "in half an hour"), used when none of the fixed reminder patterns match.
//!
//! Works on local wall-clock time and only ever returns a time after `now`.

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::Regex;
use std::sync::OnceLock;

/// Time used when a phrase names a day but no clock time
const DEFAULT_HOUR: u32 = 9;

const MONTH: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

struct CalendarPatterns {
    relative: Regex,
    half_hour: Regex,
    iso_date: Regex,
    month_day: Regex,
    day_month: Regex,
    weekday: Regex,
    named_day: Regex,
    clock_meridiem: Regex,
    clock_24h: Regex,
    part_of_day: Regex,
}

static PATTERNS: OnceLock<CalendarPatterns> = OnceLock::new();

fn patterns() -> &'static CalendarPatterns {
    fn re(pattern: &str) -> Regex {
        Regex::new(pattern).expect("calendar pattern must compile")
    }

    PATTERNS.get_or_init(|| CalendarPatterns {
        relative: re(r"(?i)\bin (a|an|one|two|three|four|five|six|seven|eight|nine|ten|\d+) (seconds?|secs?|minutes?|mins?|hours?|hrs?|days?|weeks?|months?|years?)\b"),
        half_hour: re(r"(?i)\bin half an hour\b"),
        iso_date: re(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b"),
        month_day: re(&format!(
            r"(?i)\b{MONTH}\s+(\d{{1,2}})(?:st|nd|rd|th)?\b(?:,?\s+(\d{{4}})\b)?"
        )),
        day_month: re(&format!(
            r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTH}\b(?:,?\s+(\d{{4}})\b)?"
        )),
        weekday: re(r"(?i)\b(?:(?:on|next|this)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b"),
        named_day: re(r"(?i)\b(day after tomorrow|tomorrow|tonight|today|next week|next month|next year)\b"),
        clock_meridiem: re(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s?(am|pm)\b"),
        clock_24h: re(r"\b(\d{1,2}):(\d{2})\b"),
        part_of_day: re(r"(?i)\b(noon|midnight|morning|afternoon|evening)\b"),
    })
}

fn month_name_to_number(name: &str) -> Option<u32> {
    match name.to_lowercase().as_str() {
        "january" | "jan" => Some(1),
        "february" | "feb" => Some(2),
        "march" | "mar" => Some(3),
        "april" | "apr" => Some(4),
        "may" => Some(5),
        "june" | "jun" => Some(6),
        "july" | "jul" => Some(7),
        "august" | "aug" => Some(8),
        "september" | "sep" | "sept" => Some(9),
        "october" | "oct" => Some(10),
        "november" | "nov" => Some(11),
        "december" | "dec" => Some(12),
        _ => None,
    }
}

fn parse_number_word(s: &str) -> Option<i64> {
    match s.to_lowercase().as_str() {
        "a" | "an" | "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        "seven" => Some(7),
        "eight" => Some(8),
        "nine" => Some(9),
        "ten" => Some(10),
        other => other.parse().ok(),
    }
}

fn weekday_number(name: &str) -> Option<u32> {
    match name.to_lowercase().as_str() {
        "monday" => Some(0),
        "tuesday" => Some(1),
        "wednesday" => Some(2),
        "thursday" => Some(3),
        "friday" => Some(4),
        "saturday" => Some(5),
        "sunday" => Some(6),
        _ => None,
    }
}

/// Resolve a calendar phrase in `text` to a local time strictly after `now`
pub fn resolve(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    if let Some(relative) = resolve_relative(text, now) {
        return Some(relative).filter(|t| *t > now);
    }

    let date = resolve_date(text, now);
    let time = resolve_time(text);

    let resolved = match (date, time) {
        (Some((date, _)), Some(time)) => date.and_time(time),
        (Some((date, default_time)), None) => date.and_time(default_time),
        (None, Some(time)) => {
            let today = now.date().and_time(time);
            if today > now {
                today
            } else {
                today.checked_add_signed(TimeDelta::try_days(1)?)?
            }
        }
        (None, None) => return None,
    };

    Some(resolved).filter(|t| *t > now)
}

/// `in <n> <unit>` and `in half an hour`
fn resolve_relative(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let patterns = patterns();

    if patterns.half_hour.is_match(text) {
        return now.checked_add_signed(TimeDelta::try_minutes(30)?);
    }

    let caps = patterns.relative.captures(text)?;
    let amount = parse_number_word(caps.get(1)?.as_str())?;
    let unit = caps.get(2)?.as_str().to_lowercase();
    let unit = unit.trim_end_matches('s');

    let delta = match unit {
        "sec" | "second" => TimeDelta::try_seconds(amount)?,
        "min" | "minute" => TimeDelta::try_minutes(amount)?,
        "hr" | "hour" => TimeDelta::try_hours(amount)?,
        "day" => TimeDelta::try_days(amount)?,
        "week" => TimeDelta::try_weeks(amount)?,
        "month" => {
            return now.checked_add_months(Months::new(u32::try_from(amount).ok()?));
        }
        "year" => {
            let months = u32::try_from(amount).ok()?.checked_mul(12)?;
            return now.checked_add_months(Months::new(months));
        }
        _ => return None,
    };
    now.checked_add_signed(delta)
}

/// First date phrase in `text`, with the clock time to use if none is given
fn resolve_date(text: &str, now: NaiveDateTime) -> Option<(NaiveDate, NaiveTime)> {
    let patterns = patterns();
    let today = now.date();
    let default_time = NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0)?;

    if let Some(caps) = patterns.named_day.captures(text) {
        let phrase = caps.get(1)?.as_str().to_lowercase();
        return match phrase.as_str() {
            "day after tomorrow" => Some((add_days(today, 2)?, default_time)),
            "tomorrow" => Some((add_days(today, 1)?, default_time)),
            "tonight" => Some((today, NaiveTime::from_hms_opt(20, 0, 0)?)),
            "today" => Some((today, default_time)),
            "next week" => Some((add_days(today, 7)?, default_time)),
            "next month" => Some((today.checked_add_months(Months::new(1))?, default_time)),
            "next year" => Some((today.checked_add_months(Months::new(12))?, default_time)),
            _ => None,
        };
    }

    if let Some(caps) = patterns.iso_date.captures(text) {
        let date = NaiveDate::from_ymd_opt(
            caps.get(1)?.as_str().parse().ok()?,
            caps.get(2)?.as_str().parse().ok()?,
            caps.get(3)?.as_str().parse().ok()?,
        )?;
        return Some((date, default_time));
    }

    let month_day = patterns.month_day.captures(text).and_then(|caps| {
        let month = month_name_to_number(caps.get(1)?.as_str())?;
        let day: u32 = caps.get(2)?.as_str().parse().ok()?;
        let year: Option<i32> = caps.get(3).and_then(|y| y.as_str().parse().ok());
        Some((month, day, year))
    });
    let day_month = || {
        patterns.day_month.captures(text).and_then(|caps| {
            let day: u32 = caps.get(1)?.as_str().parse().ok()?;
            let month = month_name_to_number(caps.get(2)?.as_str())?;
            let year: Option<i32> = caps.get(3).and_then(|y| y.as_str().parse().ok());
            Some((month, day, year))
        })
    };
    if let Some((month, day, year)) = month_day.or_else(day_month) {
        return Some((calendar_date(today, month, day, year)?, default_time));
    }

    if let Some(caps) = patterns.weekday.captures(text) {
        let target = weekday_number(caps.get(1)?.as_str())?;
        let current = today.weekday().num_days_from_monday();
        let mut days_ahead = i64::from(target) - i64::from(current);
        if days_ahead <= 0 {
            days_ahead += 7;
        }
        return Some((add_days(today, days_ahead)?, default_time));
    }

    None
}

/// Explicit date, or the next such day when no year is given and it has passed
fn calendar_date(today: NaiveDate, month: u32, day: u32, year: Option<i32>) -> Option<NaiveDate> {
    match year {
        Some(year) => NaiveDate::from_ymd_opt(year, month, day),
        None => {
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
            match this_year {
                Some(date) if date >= today => Some(date),
                _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
            }
        }
    }
}

/// First clock phrase in `text`
fn resolve_time(text: &str) -> Option<NaiveTime> {
    let patterns = patterns();

    if let Some(caps) = patterns.clock_meridiem.captures(text) {
        let mut hour: u32 = caps.get(1)?.as_str().parse().ok()?;
        let minute: u32 = match caps.get(2) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        if hour == 0 || hour > 12 {
            return None;
        }
        let pm = caps.get(3)?.as_str().eq_ignore_ascii_case("pm");
        if pm && hour != 12 {
            hour += 12;
        } else if !pm && hour == 12 {
            hour = 0;
        }
        return NaiveTime::from_hms_opt(hour, minute, 0);
    }

    if let Some(caps) = patterns.clock_24h.captures(text) {
        return NaiveTime::from_hms_opt(
            caps.get(1)?.as_str().parse().ok()?,
            caps.get(2)?.as_str().parse().ok()?,
            0,
        );
    }

    let caps = patterns.part_of_day.captures(text)?;
    let hour = match caps.get(1)?.as_str().to_lowercase().as_str() {
        "noon" => 12,
        "midnight" => 0,
        "morning" => 9,
        "afternoon" => 15,
        "evening" => 18,
        _ => return None,
    };
    NaiveTime::from_hms_opt(hour, 0, 0)
}

fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(TimeDelta::try_days(days)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    /// Monday 2024-01-01 10:00
    fn now() -> NaiveDateTime {
        at(2024, 1, 1, 10, 0)
    }

    #[test]
    fn test_relative_words_and_abbreviations() {
        assert_eq!(resolve("stretch in an hour", now()), Some(at(2024, 1, 1, 11, 0)));
        assert_eq!(resolve("in half an hour tea", now()), Some(at(2024, 1, 1, 10, 30)));
        assert_eq!(resolve("in three days", now()), Some(at(2024, 1, 4, 10, 0)));
        assert_eq!(resolve("in 20 mins", now()), Some(at(2024, 1, 1, 10, 20)));
        assert_eq!(resolve("in 2 hrs", now()), Some(at(2024, 1, 1, 12, 0)));
        assert_eq!(resolve("in a month", now()), Some(at(2024, 2, 1, 10, 0)));
    }

    #[test]
    fn test_named_days() {
        assert_eq!(resolve("dentist tomorrow at noon", now()), Some(at(2024, 1, 2, 12, 0)));
        assert_eq!(resolve("tomorrow", now()), Some(at(2024, 1, 2, 9, 0)));
        assert_eq!(resolve("day after tomorrow 7pm", now()), Some(at(2024, 1, 3, 19, 0)));
        assert_eq!(resolve("call tonight", now()), Some(at(2024, 1, 1, 20, 0)));
        assert_eq!(resolve("today evening", now()), Some(at(2024, 1, 1, 18, 0)));
        assert_eq!(resolve("next week", now()), Some(at(2024, 1, 8, 9, 0)));
        assert_eq!(resolve("next month", now()), Some(at(2024, 2, 1, 9, 0)));
    }

    #[test]
    fn test_explicit_dates() {
        assert_eq!(resolve("2024-03-05 14:30", now()), Some(at(2024, 3, 5, 14, 30)));
        assert_eq!(resolve("march 3rd 5pm", now()), Some(at(2024, 3, 3, 17, 0)));
        assert_eq!(resolve("15th of june", now()), Some(at(2024, 6, 15, 9, 0)));
        assert_eq!(resolve("dec 25, 2025", now()), Some(at(2025, 12, 25, 9, 0)));
    }

    #[test]
    fn test_date_without_year_rolls_forward() {
        let late = at(2024, 11, 20, 10, 0);
        assert_eq!(resolve("jan 5", late), Some(at(2025, 1, 5, 9, 0)));
    }

    #[test]
    fn test_weekday_excludes_today() {
        assert_eq!(resolve("on friday", now()), Some(at(2024, 1, 5, 9, 0)));
        assert_eq!(resolve("monday morning", now()), Some(at(2024, 1, 8, 9, 0)));
    }

    #[test]
    fn test_time_only_rolls_to_tomorrow() {
        assert_eq!(resolve("6:45", now()), Some(at(2024, 1, 2, 6, 45)));
        assert_eq!(resolve("3 pm", now()), Some(at(2024, 1, 1, 15, 0)));
        assert_eq!(resolve("midnight", now()), Some(at(2024, 1, 2, 0, 0)));
    }

    #[test]
    fn test_rejects_past_and_invalid() {
        assert_eq!(resolve("today morning", now()), None);
        assert_eq!(resolve("2023-05-01", now()), None);
        assert_eq!(resolve("13pm", now()), None);
        assert_eq!(resolve("10:75", now()), None);
        assert_eq!(resolve("in 99999999999 years", now()), None);
        assert_eq!(resolve("buy milk", now()), None);
        assert_eq!(resolve("", now()), None);
    }
}
