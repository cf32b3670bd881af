//! # Feature: Natural Language Time Parser
//!
//! Turns free-form reminder requests ("remind me to call mom in 2 hours",
//! "every Monday at 9 AM to check emails") into a firing time, a cleaned-up
//! task and, for recurring requests, a recurrence spec.
//!
//! Patterns are an ordered list: overlapping phrasings are resolved by position,
//! so `every day at 9am` is tried long before the bare `at 9am`. When nothing in
//! the list matches, the free-form calendar resolver gets a turn.
//!
//! - **Version**: 2.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.1.0: Weekly reminders start on the named weekday (legacy roll-forward behind a flag)
//! - 2.0.0: Ordered pattern list, bounds checks, calendar fallback
//! - 1.0.0: Initial relative/absolute patterns

use chrono::{
    DateTime, Datelike, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeDelta, TimeZone, Timelike, Utc,
};
use log::debug;
use regex::{Captures, Regex, RegexBuilder};
use std::sync::OnceLock;

use super::calendar;
use super::recurrence::RecurrenceSpec;
use super::reminder::ReminderKind;
use super::session::{ReminderSession, SessionStage};

/// Task used when nothing is left after removing the time phrase
pub const DEFAULT_TASK: &str = "Reminder";

/// Leading filler removed before matching; the first hit wins and only once
const FILLER_PREFIXES: [&str; 4] = ["remind me to", "remind me", "reminder to", "reminder"];

/// `H`, `HH`, `H:MM`, `HMM` or `HHMM`, optionally followed by am/pm.
/// The hour is lazy so `930` reads as 9:30; the trailing boundary stops
/// `1030` from splitting as 1:03.
const CLOCK: &str = r"(\d{1,2}?)(?::?(\d{2}))?(?:\s?(am|pm))?\b";

/// Result of parsing one request
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReminder {
    /// `None` when the text could not be understood
    pub time: Option<DateTime<Utc>>,
    pub task: String,
    pub kind: ReminderKind,
    /// Present iff `kind` is `Recurring`
    pub recurrence: Option<RecurrenceSpec>,
}

impl ParsedReminder {
    /// Unresolved result that keeps the text around for redisplay
    pub fn not_understood(task: &str) -> Self {
        let task = task.trim();
        Self {
            time: None,
            task: if task.is_empty() {
                DEFAULT_TASK.to_string()
            } else {
                task.to_string()
            },
            kind: ReminderKind::OneTime,
            recurrence: None,
        }
    }

    pub fn is_understood(&self) -> bool {
        self.time.is_some()
    }
}

/// Parser settings taken from configuration
#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
    /// The single zone all wall-clock phrases are interpreted in
    pub utc_offset: FixedOffset,
    /// Start `every <weekday> at` reminders on that weekday. When false the first
    /// firing is today/tomorrow at the clock time, whatever the weekday.
    pub align_weekly_first_occurrence: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
            align_weekly_first_occurrence: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternKind {
    InMinutes,
    InHours,
    InDays,
    InWeeks,
    InMonths,
    InYears,
    TomorrowAt,
    NextWeekdayAt,
    EveryDayAt,
    EveryWeekdayAt,
    EveryDaysAt,
    EveryHours,
    EveryMinutes,
    AtTime,
}

struct TimePattern {
    kind: PatternKind,
    regex: Regex,
}

static PATTERNS: OnceLock<Vec<TimePattern>> = OnceLock::new();

/// Patterns in evaluation order
fn patterns() -> &'static [TimePattern] {
    PATTERNS.get_or_init(|| {
        let clock = CLOCK;
        [
            (PatternKind::InMinutes, r"\bin (\d+) minutes?\b".to_string()),
            (PatternKind::InHours, r"\bin (\d+) hours?\b".to_string()),
            (PatternKind::InDays, r"\bin (\d+) days?\b".to_string()),
            (PatternKind::InWeeks, r"\bin (\d+) weeks?\b".to_string()),
            (PatternKind::InMonths, r"\bin (\d+) months?\b".to_string()),
            (PatternKind::InYears, r"\bin (\d+) years?\b".to_string()),
            (PatternKind::TomorrowAt, format!(r"\btomorrow at {clock}")),
            (PatternKind::NextWeekdayAt, format!(r"\bnext (\w+) at {clock}")),
            (PatternKind::EveryDayAt, format!(r"\bevery day at {clock}")),
            (PatternKind::EveryWeekdayAt, format!(r"\bevery (\w+) at {clock}")),
            (PatternKind::EveryDaysAt, format!(r"\bevery (\d+) days? at {clock}")),
            (PatternKind::EveryHours, r"\bevery (\d+) hours?\b".to_string()),
            (PatternKind::EveryMinutes, r"\bevery (\d+) minutes?\b".to_string()),
            (PatternKind::AtTime, format!(r"\bat {clock}")),
        ]
        .into_iter()
        .map(|(kind, pattern)| TimePattern {
            kind,
            regex: RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .expect("time pattern must compile"),
        })
        .collect()
    })
}

/// Weekday index with Monday = 0; full names and three-letter abbreviations
fn weekday_index(name: &str) -> Option<u32> {
    match name.to_lowercase().as_str() {
        "monday" | "mon" => Some(0),
        "tuesday" | "tue" => Some(1),
        "wednesday" | "wed" => Some(2),
        "thursday" | "thu" => Some(3),
        "friday" | "fri" => Some(4),
        "saturday" | "sat" => Some(5),
        "sunday" | "sun" => Some(6),
        _ => None,
    }
}

/// Read `hour[:minute][am|pm]` starting at capture group `first`.
///
/// Applies the 12-hour rule; an hour without a meridiem is taken as 24-hour.
/// Returns `None` for values that are not a real clock time.
fn clock_time(caps: &Captures, first: usize) -> Option<NaiveTime> {
    let mut hour: u32 = caps.get(first)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(first + 1) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };

    match caps.get(first + 2).map(|m| m.as_str().to_lowercase()).as_deref() {
        Some("pm") if hour != 12 => hour += 12,
        Some("am") if hour == 12 => hour = 0,
        _ => {}
    }

    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn count(caps: &Captures, group: usize) -> Option<u32> {
    caps.get(group)?.as_str().parse().ok()
}

/// Step count for a cron field: positive and inside the field's range
fn step(caps: &Captures, group: usize, max: u32) -> Option<u32> {
    count(caps, group).filter(|n| (1..=max).contains(n))
}

/// Today at `time`, or tomorrow when that is not after `now`
fn today_or_tomorrow(now: NaiveDateTime, time: NaiveTime) -> Option<NaiveDateTime> {
    let candidate = now.date().and_time(time);
    if candidate <= now {
        candidate.checked_add_signed(TimeDelta::try_days(1)?)
    } else {
        Some(candidate)
    }
}

fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(TimeDelta::try_days(days)?)
}

/// What a matched pattern resolves to, in local wall-clock terms
enum Resolution {
    /// Exact instant (relative offsets in minutes/hours/days/weeks)
    Instant(DateTime<Utc>),
    /// Local wall-clock time
    Local(NaiveDateTime),
}

/// Natural language reminder parser. Stateless and safe to share.
#[derive(Debug, Clone, Default)]
pub struct TimeParser {
    options: ParserOptions,
}

impl TimeParser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    /// Parse a reminder request relative to `now`
    pub fn parse(&self, text: &str, now: DateTime<Utc>) -> ParsedReminder {
        let text = strip_filler(&text.to_lowercase());

        for pattern in patterns() {
            let Some(caps) = pattern.regex.captures(&text) else {
                continue;
            };
            match self.resolve(pattern.kind, &caps, now) {
                Some((time, recurrence)) => {
                    debug!(
                        "Matched {:?} in {:?} -> {} ({:?})",
                        pattern.kind,
                        text,
                        time,
                        recurrence.map(|spec| spec.to_string())
                    );
                    return ParsedReminder {
                        time: Some(time),
                        task: extract_task(&text),
                        kind: if recurrence.is_some() {
                            ReminderKind::Recurring
                        } else {
                            ReminderKind::OneTime
                        },
                        recurrence,
                    };
                }
                None => debug!("{:?} matched {:?} but did not resolve", pattern.kind, text),
            }
        }

        let local_now = self.local(now);
        if let Some(time) = calendar::resolve(&text, local_now).and_then(|t| self.to_utc(t)) {
            debug!("Calendar fallback resolved {:?} -> {}", text, time);
            return ParsedReminder {
                time: Some(time),
                ..ParsedReminder::not_understood(&text)
            };
        }

        debug!("Could not understand {:?}", text);
        ParsedReminder::not_understood(&text)
    }

    /// Parse within a guided conversation.
    ///
    /// When the session already holds a task, `text` is treated as the time
    /// phrase for that task.
    pub fn parse_for_session(
        &self,
        session: &ReminderSession,
        text: &str,
        now: DateTime<Utc>,
    ) -> ParsedReminder {
        match &session.stage {
            SessionStage::AwaitingTime { task } => {
                self.parse(&format!("remind me to {} {}", task, text.trim()), now)
            }
            _ => self.parse(text, now),
        }
    }

    /// Render a firing time in the configured zone
    pub fn format(&self, time: DateTime<Utc>, language: &str) -> String {
        format_reminder_time(self.local(time), language)
    }

    /// `now` as local wall-clock time
    pub fn local(&self, time: DateTime<Utc>) -> NaiveDateTime {
        time.with_timezone(&self.options.utc_offset).naive_local()
    }

    fn to_utc(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.options
            .utc_offset
            .from_local_datetime(&local)
            .single()
            .map(|t| t.with_timezone(&Utc))
    }

    fn resolve(
        &self,
        kind: PatternKind,
        caps: &Captures,
        now: DateTime<Utc>,
    ) -> Option<(DateTime<Utc>, Option<RecurrenceSpec>)> {
        let local_now = self.local(now);

        let (resolution, recurrence) = match kind {
            PatternKind::InMinutes => (
                Resolution::Instant(
                    now.checked_add_signed(TimeDelta::try_minutes(count(caps, 1)?.into())?)?,
                ),
                None,
            ),
            PatternKind::InHours => (
                Resolution::Instant(
                    now.checked_add_signed(TimeDelta::try_hours(count(caps, 1)?.into())?)?,
                ),
                None,
            ),
            PatternKind::InDays => (
                Resolution::Instant(
                    now.checked_add_signed(TimeDelta::try_days(count(caps, 1)?.into())?)?,
                ),
                None,
            ),
            PatternKind::InWeeks => (
                Resolution::Instant(
                    now.checked_add_signed(TimeDelta::try_weeks(count(caps, 1)?.into())?)?,
                ),
                None,
            ),
            PatternKind::InMonths => (
                Resolution::Local(local_now.checked_add_months(Months::new(count(caps, 1)?))?),
                None,
            ),
            PatternKind::InYears => (
                Resolution::Local(
                    local_now.checked_add_months(Months::new(count(caps, 1)?.checked_mul(12)?))?,
                ),
                None,
            ),
            PatternKind::TomorrowAt => {
                let time = clock_time(caps, 1)?;
                (
                    Resolution::Local(add_days(local_now.date(), 1)?.and_time(time)),
                    None,
                )
            }
            PatternKind::NextWeekdayAt => {
                let target = weekday_index(caps.get(1)?.as_str())?;
                let time = clock_time(caps, 2)?;
                let current = local_now.weekday().num_days_from_monday();
                let mut days_ahead = i64::from(target) - i64::from(current);
                if days_ahead <= 0 {
                    days_ahead += 7;
                }
                (
                    Resolution::Local(add_days(local_now.date(), days_ahead)?.and_time(time)),
                    None,
                )
            }
            PatternKind::EveryDayAt => {
                let time = clock_time(caps, 1)?;
                (
                    Resolution::Local(today_or_tomorrow(local_now, time)?),
                    Some(RecurrenceSpec::daily(time.hour(), time.minute())),
                )
            }
            PatternKind::EveryWeekdayAt => {
                let target = weekday_index(caps.get(1)?.as_str())?;
                let time = clock_time(caps, 2)?;
                let first = if self.options.align_weekly_first_occurrence {
                    next_weekday_occurrence(local_now, target, time)?
                } else {
                    today_or_tomorrow(local_now, time)?
                };
                (
                    Resolution::Local(first),
                    Some(RecurrenceSpec::weekly(target, time.hour(), time.minute())),
                )
            }
            PatternKind::EveryDaysAt => {
                let days = step(caps, 1, 31)?;
                let time = clock_time(caps, 2)?;
                (
                    Resolution::Local(today_or_tomorrow(local_now, time)?),
                    Some(RecurrenceSpec::every_n_days(days, time.hour(), time.minute())),
                )
            }
            PatternKind::EveryHours => {
                let hours = step(caps, 1, 23)?;
                (
                    Resolution::Instant(
                        now.checked_add_signed(TimeDelta::try_hours(hours.into())?)?,
                    ),
                    Some(RecurrenceSpec::every_n_hours(hours)),
                )
            }
            PatternKind::EveryMinutes => {
                let minutes = step(caps, 1, 59)?;
                (
                    Resolution::Instant(
                        now.checked_add_signed(TimeDelta::try_minutes(minutes.into())?)?,
                    ),
                    Some(RecurrenceSpec::every_n_minutes(minutes)),
                )
            }
            PatternKind::AtTime => {
                let time = clock_time(caps, 1)?;
                (Resolution::Local(today_or_tomorrow(local_now, time)?), None)
            }
        };

        let time = match resolution {
            Resolution::Instant(time) => time,
            Resolution::Local(local) => self.to_utc(local)?,
        };
        Some((time, recurrence))
    }
}

/// First `weekday` at `time` strictly after `now` (today counts if still ahead)
fn next_weekday_occurrence(now: NaiveDateTime, weekday: u32, time: NaiveTime) -> Option<NaiveDateTime> {
    let current = now.weekday().num_days_from_monday();
    let mut days_ahead = i64::from(weekday) - i64::from(current);
    if days_ahead < 0 {
        days_ahead += 7;
    }
    let candidate = add_days(now.date(), days_ahead)?.and_time(time);
    if candidate <= now {
        add_days(candidate.date(), 7).map(|date| date.and_time(time))
    } else {
        Some(candidate)
    }
}

/// Remove one leading filler phrase, only when it ends on a word boundary
fn strip_filler(text: &str) -> String {
    let text = text.trim();
    for prefix in FILLER_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return rest.trim().to_string();
            }
        }
    }
    text.to_string()
}

/// Remove every time phrase and tidy what is left
fn extract_task(text: &str) -> String {
    let mut task = text.to_string();
    for pattern in patterns() {
        task = pattern.regex.replace_all(&task, " ").into_owned();
    }

    let collapsed = task.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(['.', ',', '!', '?']).trim();
    let trimmed = match trimmed.strip_prefix("to") {
        Some("") => "",
        Some(rest) if rest.starts_with(' ') => rest.trim(),
        _ => trimmed,
    };
    let trimmed = trimmed.trim_matches(['.', ',', '!', '?']).trim();

    if trimmed.is_empty() {
        DEFAULT_TASK.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `"hi"` gets `dd/mm/YYYY hh:MM AM`; every other code gets the long English layout
pub fn format_reminder_time(time: NaiveDateTime, language: &str) -> String {
    if language == "hi" {
        time.format("%d/%m/%Y %I:%M %p").to_string()
    } else {
        time.format("%B %d, %Y at %I:%M %p").to_string()
    }
}
