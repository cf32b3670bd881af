//! Storage seam for reminders and per-user preferences.
//!
//! The bot and the dispatch loop only talk to storage through this trait, so
//! tests can swap in an in-memory store.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::reminder::{NewReminder, Reminder};

#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Persist a confirmed reminder and return its new id
    async fn add_reminder(&self, reminder: &NewReminder) -> Result<i64>;

    /// Active reminders with `scheduled_at <= now`, oldest first
    async fn get_due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>>;

    /// Deactivate a delivered one-time reminder.
    ///
    /// No-op for recurring or already inactive reminders.
    async fn mark_one_time_sent(&self, id: i64) -> Result<()>;

    /// Move an active reminder to its next occurrence
    async fn reschedule(&self, id: i64, next: DateTime<Utc>) -> Result<()>;

    /// Deactivate a reminder owned by `owner`. Returns false when no such
    /// active reminder exists.
    async fn delete_reminder(&self, id: i64, owner: &str) -> Result<bool>;

    /// Active reminders for a user, soonest first
    async fn get_user_reminders(&self, owner: &str) -> Result<Vec<Reminder>>;

    /// Number of active reminders for a user
    async fn get_reminder_count(&self, owner: &str) -> Result<i64>;

    /// Preferred language, defaulting to English for unknown users
    async fn get_user_language(&self, owner: &str) -> Result<String>;

    async fn set_user_language(&self, owner: &str, language: &str) -> Result<()>;
}
