//! Reminder records shared by the parser, the store and the dispatch loop

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::recurrence::RecurrenceSpec;
use super::time_parser::ParsedReminder;

/// Whether a reminder fires once or on a recurrence spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    /// Fires once, then is deactivated
    OneTime,
    /// Fires on every occurrence of its recurrence spec until deleted
    Recurring,
}

impl std::fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReminderKind::OneTime => write!(f, "one_time"),
            ReminderKind::Recurring => write!(f, "recurring"),
        }
    }
}

impl std::str::FromStr for ReminderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "one_time" => Ok(ReminderKind::OneTime),
            "recurring" => Ok(ReminderKind::Recurring),
            _ => Err(anyhow::anyhow!("Invalid reminder kind: {}", s)),
        }
    }
}

/// A persisted reminder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    /// Store-assigned identifier, never reused
    pub id: i64,

    /// User who asked for the reminder
    pub owner: String,

    /// What to remind about
    pub task: String,

    /// Next (or only) firing time
    pub scheduled_at: DateTime<Utc>,

    pub kind: ReminderKind,

    /// Present iff `kind` is `Recurring`
    pub recurrence: Option<RecurrenceSpec>,

    /// Language code used when rendering notifications
    pub language: String,

    /// False once delivered (one-time) or deleted
    pub active: bool,

    pub created_at: DateTime<Utc>,
}

/// A reminder the user has confirmed but that has no id yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewReminder {
    pub owner: String,
    pub task: String,
    pub scheduled_at: DateTime<Utc>,
    pub kind: ReminderKind,
    pub recurrence: Option<RecurrenceSpec>,
    pub language: String,
}

impl NewReminder {
    /// Build a reminder from parser output.
    ///
    /// Returns `None` when the parser could not resolve a time; such input must
    /// never be persisted.
    pub fn from_parsed(owner: &str, parsed: &ParsedReminder, language: &str) -> Option<Self> {
        Some(Self {
            owner: owner.to_string(),
            task: parsed.task.clone(),
            scheduled_at: parsed.time?,
            kind: parsed.kind,
            recurrence: parsed.recurrence,
            language: language.to_string(),
        })
    }

    /// Check the kind/recurrence pairing before it reaches storage
    pub fn validate(&self) -> Result<()> {
        match (self.kind, &self.recurrence) {
            (ReminderKind::OneTime, Some(spec)) => {
                bail!("One-time reminder cannot carry a recurrence spec ({spec})")
            }
            (ReminderKind::Recurring, None) => {
                bail!("Recurring reminder needs a recurrence spec")
            }
            _ => {}
        }
        if self.task.trim().is_empty() {
            bail!("Reminder task cannot be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_reminder(kind: ReminderKind, recurrence: Option<RecurrenceSpec>) -> NewReminder {
        NewReminder {
            owner: "42".to_string(),
            task: "stretch".to_string(),
            scheduled_at: Utc::now(),
            kind,
            recurrence,
            language: "en".to_string(),
        }
    }

    #[test]
    fn test_kind_round_trips_through_text() {
        for kind in [ReminderKind::OneTime, ReminderKind::Recurring] {
            assert_eq!(kind.to_string().parse::<ReminderKind>().unwrap(), kind);
        }
        assert!("weekly".parse::<ReminderKind>().is_err());
    }

    #[test]
    fn test_validate_pairs_kind_and_recurrence() {
        let daily = RecurrenceSpec::daily(9, 0);
        assert!(new_reminder(ReminderKind::OneTime, None).validate().is_ok());
        assert!(new_reminder(ReminderKind::Recurring, Some(daily)).validate().is_ok());
        assert!(new_reminder(ReminderKind::OneTime, Some(daily)).validate().is_err());
        assert!(new_reminder(ReminderKind::Recurring, None).validate().is_err());
    }

    #[test]
    fn test_from_parsed_requires_time() {
        let parsed = ParsedReminder::not_understood("sometime soon");
        assert!(NewReminder::from_parsed("42", &parsed, "en").is_none());
    }
}
