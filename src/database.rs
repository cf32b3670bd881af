//! SQLite persistence for reminders and user preferences
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 2.0.0: Recurring reminders, soft delete, per-user language
//! - 1.0.0: One-time reminders table

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, error, info, warn};
use sqlite::{Connection, State, Statement};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::features::reminders::notification::{normalize_language, DEFAULT_LANGUAGE};
use crate::features::reminders::{NewReminder, RecurrenceSpec, Reminder, ReminderStore};

/// Stored timestamp layout; UTC, so text order is time order
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS reminders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        task TEXT NOT NULL,
        scheduled_at TEXT NOT NULL,
        reminder_type TEXT NOT NULL DEFAULT 'one_time',
        cron_expression TEXT NOT NULL DEFAULT '',
        language TEXT NOT NULL DEFAULT 'en',
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_reminders_due ON reminders (is_active, scheduled_at);
    CREATE INDEX IF NOT EXISTS idx_reminders_user ON reminders (user_id, is_active);
    CREATE TABLE IF NOT EXISTS user_preferences (
        user_id TEXT PRIMARY KEY,
        language TEXT NOT NULL DEFAULT 'en',
        is_premium INTEGER NOT NULL DEFAULT 0
    );
";

const REMINDER_COLUMNS: &str =
    "id, user_id, task, scheduled_at, reminder_type, cron_expression, language, is_active, created_at";

fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .with_context(|| format!("Invalid stored timestamp: {raw}"))?;
    Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

fn reminder_from_row(statement: &Statement) -> Result<Reminder> {
    let id = statement.read::<i64, _>("id")?;
    let cron = statement.read::<String, _>("cron_expression")?;
    let recurrence = if cron.is_empty() {
        None
    } else {
        Some(
            cron.parse::<RecurrenceSpec>()
                .with_context(|| format!("Reminder {id} has an invalid recurrence"))?,
        )
    };

    Ok(Reminder {
        id,
        owner: statement.read::<String, _>("user_id")?,
        task: statement.read::<String, _>("task")?,
        scheduled_at: parse_timestamp(&statement.read::<String, _>("scheduled_at")?)?,
        kind: statement.read::<String, _>("reminder_type")?.parse()?,
        recurrence,
        language: statement.read::<String, _>("language")?,
        active: statement.read::<i64, _>("is_active")? != 0,
        created_at: parse_timestamp(&statement.read::<String, _>("created_at")?)?,
    })
}

/// Rows that decode, plus the ids of rows that do not
struct Rows {
    reminders: Vec<Reminder>,
    undecodable: Vec<i64>,
}

fn collect_reminders(mut statement: Statement) -> Result<Rows> {
    let mut rows = Rows {
        reminders: Vec::new(),
        undecodable: Vec::new(),
    };
    while let State::Row = statement.next()? {
        match reminder_from_row(&statement) {
            Ok(reminder) => rows.reminders.push(reminder),
            Err(e) => {
                let id = statement.read::<i64, _>("id")?;
                error!("Skipping unreadable reminder {id}: {e:#}");
                rows.undecodable.push(id);
            }
        }
    }
    Ok(rows)
}

fn read_count(mut statement: Statement) -> Result<i64> {
    match statement.next()? {
        State::Row => Ok(statement.read::<i64, _>(0usize)?),
        State::Done => Ok(0),
    }
}

/// Shared handle to the reminder database. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at `path`; `:memory:` works for tests
    pub async fn new(path: &str) -> Result<Self> {
        let connection =
            sqlite::open(path).with_context(|| format!("Failed to open database at {path}"))?;
        connection
            .execute(SCHEMA)
            .context("Failed to initialise database schema")?;

        info!("Database ready at {path}");
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Number of active reminders across all users
    pub async fn active_reminder_count(&self) -> Result<i64> {
        let conn = self.connection.lock().await;
        let statement = conn.prepare("SELECT COUNT(*) FROM reminders WHERE is_active = 1")?;
        read_count(statement)
    }
}

#[async_trait]
impl ReminderStore for Database {
    async fn add_reminder(&self, reminder: &NewReminder) -> Result<i64> {
        reminder.validate()?;

        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "INSERT INTO reminders
                (user_id, task, scheduled_at, reminder_type, cron_expression, language, is_active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, 1, ?)",
        )?;
        let cron = reminder
            .recurrence
            .map(|spec| spec.to_string())
            .unwrap_or_default();
        let kind = reminder.kind.to_string();
        let scheduled_at = format_timestamp(reminder.scheduled_at);
        let created_at = format_timestamp(Utc::now());

        statement.bind((1, reminder.owner.as_str()))?;
        statement.bind((2, reminder.task.as_str()))?;
        statement.bind((3, scheduled_at.as_str()))?;
        statement.bind((4, kind.as_str()))?;
        statement.bind((5, cron.as_str()))?;
        statement.bind((6, reminder.language.as_str()))?;
        statement.bind((7, created_at.as_str()))?;
        statement.next().context("Failed to insert reminder")?;
        drop(statement);

        let id = read_count(conn.prepare("SELECT last_insert_rowid()")?)?;
        debug!(
            "Stored reminder {id} for {} at {scheduled_at} ({kind})",
            reminder.owner
        );
        Ok(id)
    }

    async fn get_due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE is_active = 1 AND scheduled_at <= ?
             ORDER BY scheduled_at ASC, id ASC"
        ))?;
        statement.bind((1, format_timestamp(now).as_str()))?;
        let rows = collect_reminders(statement)?;

        // Otherwise they would come back due on every tick
        for id in &rows.undecodable {
            let mut deactivate = conn.prepare("UPDATE reminders SET is_active = 0 WHERE id = ?")?;
            deactivate.bind((1, *id))?;
            deactivate.next()?;
            warn!("Deactivated unreadable reminder {id}");
        }
        Ok(rows.reminders)
    }

    async fn mark_one_time_sent(&self, id: i64) -> Result<()> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "UPDATE reminders SET is_active = 0 WHERE id = ? AND reminder_type = 'one_time'",
        )?;
        statement.bind((1, id))?;
        statement.next()?;
        Ok(())
    }

    async fn reschedule(&self, id: i64, next: DateTime<Utc>) -> Result<()> {
        let conn = self.connection.lock().await;
        let mut statement =
            conn.prepare("UPDATE reminders SET scheduled_at = ? WHERE id = ? AND is_active = 1")?;
        statement.bind((1, format_timestamp(next).as_str()))?;
        statement.bind((2, id))?;
        statement.next()?;
        Ok(())
    }

    async fn delete_reminder(&self, id: i64, owner: &str) -> Result<bool> {
        let conn = self.connection.lock().await;

        let mut lookup = conn.prepare(
            "SELECT COUNT(*) FROM reminders WHERE id = ? AND user_id = ? AND is_active = 1",
        )?;
        lookup.bind((1, id))?;
        lookup.bind((2, owner))?;
        if read_count(lookup)? == 0 {
            return Ok(false);
        }

        let mut statement =
            conn.prepare("UPDATE reminders SET is_active = 0 WHERE id = ? AND user_id = ?")?;
        statement.bind((1, id))?;
        statement.bind((2, owner))?;
        statement.next()?;
        Ok(true)
    }

    async fn get_user_reminders(&self, owner: &str) -> Result<Vec<Reminder>> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE user_id = ? AND is_active = 1
             ORDER BY scheduled_at ASC, id ASC"
        ))?;
        statement.bind((1, owner))?;
        Ok(collect_reminders(statement)?.reminders)
    }

    async fn get_reminder_count(&self, owner: &str) -> Result<i64> {
        let conn = self.connection.lock().await;
        let mut statement =
            conn.prepare("SELECT COUNT(*) FROM reminders WHERE user_id = ? AND is_active = 1")?;
        statement.bind((1, owner))?;
        read_count(statement)
    }

    async fn get_user_language(&self, owner: &str) -> Result<String> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare("SELECT language FROM user_preferences WHERE user_id = ?")?;
        statement.bind((1, owner))?;
        match statement.next()? {
            State::Row => Ok(statement.read::<String, _>(0usize)?),
            State::Done => Ok(DEFAULT_LANGUAGE.to_string()),
        }
    }

    async fn set_user_language(&self, owner: &str, language: &str) -> Result<()> {
        let language = normalize_language(language);
        let conn = self.connection.lock().await;

        let mut insert = conn
            .prepare("INSERT OR IGNORE INTO user_preferences (user_id, language) VALUES (?, ?)")?;
        insert.bind((1, owner))?;
        insert.bind((2, language))?;
        insert.next()?;
        drop(insert);

        let mut update = conn.prepare("UPDATE user_preferences SET language = ? WHERE user_id = ?")?;
        update.bind((1, language))?;
        update.bind((2, owner))?;
        update.next()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reminders::{NotificationOptions, Notifier, ReminderKind, ReminderScheduler};
    use chrono::{Offset, TimeDelta, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    fn one_time(owner: &str, time: DateTime<Utc>) -> NewReminder {
        NewReminder {
            owner: owner.to_string(),
            task: "drink water".to_string(),
            scheduled_at: time,
            kind: ReminderKind::OneTime,
            recurrence: None,
            language: "en".to_string(),
        }
    }

    fn daily(owner: &str, time: DateTime<Utc>) -> NewReminder {
        NewReminder {
            kind: ReminderKind::Recurring,
            recurrence: Some(RecurrenceSpec::daily(9, 0)),
            ..one_time(owner, time)
        }
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let db = Database::new(":memory:").await.unwrap();
        let first = db.add_reminder(&one_time("alice", at(12, 0))).await.unwrap();
        let second = db.add_reminder(&daily("alice", at(9, 0))).await.unwrap();
        db.add_reminder(&one_time("bob", at(8, 0))).await.unwrap();
        assert!(second > first);

        let reminders = db.get_user_reminders("alice").await.unwrap();
        assert_eq!(reminders.len(), 2);
        // Soonest first
        assert_eq!(reminders[0].id, second);
        assert_eq!(reminders[0].kind, ReminderKind::Recurring);
        assert_eq!(reminders[0].recurrence, Some(RecurrenceSpec::daily(9, 0)));
        assert_eq!(reminders[1].id, first);
        assert_eq!(reminders[1].recurrence, None);
        assert_eq!(reminders[1].scheduled_at, at(12, 0));
        assert!(reminders[1].active);

        assert_eq!(db.get_reminder_count("alice").await.unwrap(), 2);
        assert_eq!(db.get_reminder_count("nobody").await.unwrap(), 0);
        assert_eq!(db.active_reminder_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_invalid_reminder_rejected() {
        let db = Database::new(":memory:").await.unwrap();
        let mut broken = one_time("alice", at(12, 0));
        broken.recurrence = Some(RecurrenceSpec::daily(9, 0));
        assert!(db.add_reminder(&broken).await.is_err());
        assert_eq!(db.get_reminder_count("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_due_reminders_ordered_and_filtered() {
        let db = Database::new(":memory:").await.unwrap();
        let late = db.add_reminder(&one_time("alice", at(9, 59))).await.unwrap();
        let early = db.add_reminder(&one_time("bob", at(9, 0))).await.unwrap();
        db.add_reminder(&one_time("carol", at(10, 1))).await.unwrap();

        let due = db.get_due_reminders(at(10, 0)).await.unwrap();
        let ids: Vec<i64> = due.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![early, late]);

        // Boundary is inclusive
        let due = db.get_due_reminders(at(10, 1)).await.unwrap();
        assert_eq!(due.len(), 3);
    }

    #[tokio::test]
    async fn test_mark_one_time_sent() {
        let db = Database::new(":memory:").await.unwrap();
        let once = db.add_reminder(&one_time("alice", at(9, 0))).await.unwrap();
        let recurring = db.add_reminder(&daily("alice", at(9, 0))).await.unwrap();

        db.mark_one_time_sent(once).await.unwrap();
        db.mark_one_time_sent(once).await.unwrap();
        db.mark_one_time_sent(recurring).await.unwrap();

        let due = db.get_due_reminders(at(10, 0)).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, recurring);
    }

    #[tokio::test]
    async fn test_reschedule() {
        let db = Database::new(":memory:").await.unwrap();
        let id = db.add_reminder(&daily("alice", at(9, 0))).await.unwrap();

        let tomorrow = at(9, 0) + TimeDelta::days(1);
        db.reschedule(id, tomorrow).await.unwrap();

        assert!(db.get_due_reminders(at(10, 0)).await.unwrap().is_empty());
        let reminders = db.get_user_reminders("alice").await.unwrap();
        assert_eq!(reminders[0].scheduled_at, tomorrow);
    }

    #[tokio::test]
    async fn test_delete_is_owner_scoped_soft_delete() {
        let db = Database::new(":memory:").await.unwrap();
        let id = db.add_reminder(&one_time("alice", at(9, 0))).await.unwrap();

        assert!(!db.delete_reminder(id, "bob").await.unwrap());
        assert!(db.delete_reminder(id, "alice").await.unwrap());
        assert!(!db.delete_reminder(id, "alice").await.unwrap());
        assert!(db.get_due_reminders(at(10, 0)).await.unwrap().is_empty());

        // Ids are never reused
        let next = db.add_reminder(&one_time("alice", at(9, 0))).await.unwrap();
        assert!(next > id);
    }

    async fn insert_raw(db: &Database, owner: &str, kind: &str, cron: &str) {
        let conn = db.connection.lock().await;
        conn.execute(format!(
            "INSERT INTO reminders
                (user_id, task, scheduled_at, reminder_type, cron_expression, language, is_active, created_at)
             VALUES ('{owner}', 'legacy', '2024-01-01 09:00:00', '{kind}', '{cron}', 'en', 1, '2024-01-01 08:00:00')"
        ))
        .unwrap();
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_notification(
            &self,
            owner: &str,
            _text: &str,
            _options: &NotificationOptions,
        ) -> Result<()> {
            self.sent.lock().unwrap().push(owner.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unreadable_row_does_not_hide_others() {
        let db = Database::new(":memory:").await.unwrap();
        let good = db.add_reminder(&one_time("alice", at(9, 30))).await.unwrap();
        insert_raw(&db, "bob", "recurring", "0 9 * * 1,3").await;
        insert_raw(&db, "carol", "weekly", "").await;

        let due = db.get_due_reminders(at(10, 0)).await.unwrap();
        let ids: Vec<i64> = due.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![good]);

        // Bad rows are switched off instead of failing every later query
        assert_eq!(db.active_reminder_count().await.unwrap(), 1);
        assert!(db.get_user_reminders("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tick_delivers_around_unreadable_row() {
        let db = Database::new(":memory:").await.unwrap();
        let good = db.add_reminder(&one_time("alice", at(9, 30))).await.unwrap();
        insert_raw(&db, "bob", "recurring", "0 9 * * 1,3").await;

        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler = ReminderScheduler::new(Arc::new(db.clone()), notifier.clone(), Utc.fix());
        let report = scheduler.tick(at(10, 0)).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(*notifier.sent.lock().unwrap(), vec!["alice".to_string()]);
        assert!(db.get_due_reminders(at(10, 1)).await.unwrap().iter().all(|r| r.id != good));
    }

    #[tokio::test]
    async fn test_language_preference() {
        let db = Database::new(":memory:").await.unwrap();
        assert_eq!(db.get_user_language("alice").await.unwrap(), "en");

        db.set_user_language("alice", "hi").await.unwrap();
        assert_eq!(db.get_user_language("alice").await.unwrap(), "hi");

        db.set_user_language("alice", "en").await.unwrap();
        assert_eq!(db.get_user_language("alice").await.unwrap(), "en");

        // Unsupported codes fall back to the default
        db.set_user_language("bob", "xx").await.unwrap();
        assert_eq!(db.get_user_language("bob").await.unwrap(), "en");
    }
}
