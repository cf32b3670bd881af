//! Reminder conversation handler
//!
//! Handles: !remind, !reminders, !delete, !language, !help, !stop, free text
//! and the confirm/cancel/new-reminder buttons.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.3.0
//!
//! ## Changelog
//! - 2.0.0: Natural language times, guided sessions, recurring reminders
//! - 1.0.0: Duration-based `!remind` with list and delete

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::sync::Arc;

use crate::core::response::truncate_chars;
use crate::features::reminders::notification::{normalize_language, SUPPORTED_LANGUAGES};
use crate::features::reminders::{
    NewReminder, ParsedReminder, ReminderKind, ReminderStore, SessionStage, SessionStore,
    TimeParser,
};

pub const DEFAULT_MAX_REMINDERS_PER_USER: i64 = 50;
pub const DEFAULT_MAX_TASK_LENGTH: usize = 500;

const HELP_TEXT: &str = "🤖 **Reminder Bot**

Just tell me what and when, for example:
• `remind me to call mom in 30 minutes`
• `drink water every 2 hours`
• `team sync every monday at 10am`
• `pay rent tomorrow at 9am`

**Commands:**
• `!remind` - set a reminder step by step
• `!reminders` - list your active reminders
• `!delete <id>` - delete a reminder
• `!language <en|hi>` - change notification language
• `!stop` - cancel what you're doing
• `!help` - show this message";

const NOT_UNDERSTOOD: &str = "🤔 I couldn't work out when to remind you.

Try something like `in 30 minutes`, `tomorrow at 9am`, `every day at 8pm` or `next friday at 6pm`.";

/// Button attached to a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyButton {
    Confirm,
    Cancel,
    NewReminder,
}

impl ReplyButton {
    pub const ALL: [ReplyButton; 3] = [Self::Confirm, Self::Cancel, Self::NewReminder];

    pub fn custom_id(&self) -> &'static str {
        match self {
            Self::Confirm => "reminder_confirm",
            Self::Cancel => "reminder_cancel",
            Self::NewReminder => "new_reminder",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Confirm => "✅ Confirm",
            Self::Cancel => "❌ Cancel",
            Self::NewReminder => "➕ Set New Reminder",
        }
    }

    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.custom_id() == custom_id)
    }
}

/// Transport-independent reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    pub buttons: Vec<ReplyButton>,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            buttons: Vec::new(),
        }
    }

    pub fn with_buttons(mut self, buttons: &[ReplyButton]) -> Self {
        self.buttons = buttons.to_vec();
        self
    }
}

/// Handler for reminder conversations
pub struct RemindHandler {
    store: Arc<dyn ReminderStore>,
    parser: TimeParser,
    sessions: SessionStore,
    max_reminders_per_user: i64,
    max_task_length: usize,
}

impl RemindHandler {
    pub fn new(store: Arc<dyn ReminderStore>, parser: TimeParser, sessions: SessionStore) -> Self {
        Self {
            store,
            parser,
            sessions,
            max_reminders_per_user: DEFAULT_MAX_REMINDERS_PER_USER,
            max_task_length: DEFAULT_MAX_TASK_LENGTH,
        }
    }

    pub fn with_limits(mut self, max_reminders_per_user: i64, max_task_length: usize) -> Self {
        self.max_reminders_per_user = max_reminders_per_user;
        self.max_task_length = max_task_length;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handle a chat message from `user_id`
    pub async fn handle_message(&self, user_id: &str, text: &str, now: DateTime<Utc>) -> Result<Reply> {
        let text = text.trim();
        let (command, args) = match text.split_once(char::is_whitespace) {
            Some((command, args)) => (command, args.trim()),
            None => (text, ""),
        };

        match command.to_lowercase().as_str() {
            "!remind" if args.is_empty() => Ok(self.start_session(user_id)),
            "!remind" => self.parse_request(user_id, args, now).await,
            "!reminders" | "!list" => self.list_reminders(user_id, now).await,
            "!delete" => self.delete_reminder(user_id, args).await,
            "!language" => self.handle_language(user_id, args).await,
            "!help" | "!start" => Ok(Reply::text(HELP_TEXT)),
            "!stop" | "!cancel" => Ok(self.stop(user_id)),
            _ => self.handle_text(user_id, text, now).await,
        }
    }

    /// Handle a button click
    pub async fn handle_button(&self, user_id: &str, custom_id: &str, now: DateTime<Utc>) -> Result<Reply> {
        debug!("Button {custom_id} from {user_id}");
        match ReplyButton::from_custom_id(custom_id) {
            Some(ReplyButton::Confirm) => self.confirm(user_id, now).await,
            Some(ReplyButton::Cancel) => Ok(self.stop(user_id)),
            Some(ReplyButton::NewReminder) => Ok(self.start_session(user_id)),
            None => Ok(Reply::text("Unknown action.")),
        }
    }

    fn start_session(&self, user_id: &str) -> Reply {
        self.sessions.set(user_id, SessionStage::AwaitingTask);
        Reply::text("📝 What should I remind you about?")
    }

    fn stop(&self, user_id: &str) -> Reply {
        if self.sessions.clear(user_id) {
            Reply::text("🛑 Cancelled. Nothing was saved.")
        } else {
            Reply::text("There's nothing to cancel.")
        }
    }

    async fn handle_text(&self, user_id: &str, text: &str, now: DateTime<Utc>) -> Result<Reply> {
        let answer = text.to_lowercase();
        let Some(session) = self.sessions.get(user_id) else {
            if is_yes(&answer) || is_no(&answer) {
                return Ok(Reply::text("There's no reminder waiting for confirmation."));
            }
            return self.parse_request(user_id, text, now).await;
        };

        match &session.stage {
            SessionStage::AwaitingTask => {
                let task = truncate_chars(text, self.max_task_length);
                self.sessions
                    .set(user_id, SessionStage::AwaitingTime { task: task.clone() });
                Ok(Reply::text(format!(
                    "⏰ When should I remind you to **{task}**?\n\nFor example `in 2 hours`, `tomorrow at 9am` or `every day at 8pm`."
                )))
            }
            SessionStage::AwaitingTime { .. } => {
                let parsed = self.parser.parse_for_session(&session, text, now);
                if parsed.is_understood() {
                    self.ask_confirmation(user_id, parsed).await
                } else {
                    Ok(Reply::text(NOT_UNDERSTOOD))
                }
            }
            SessionStage::AwaitingConfirmation { .. } if is_yes(&answer) => self.confirm(user_id, now).await,
            SessionStage::AwaitingConfirmation { .. } if is_no(&answer) => Ok(self.stop(user_id)),
            SessionStage::AwaitingConfirmation { .. } => Ok(Reply::text(
                "Please reply **yes** to save the reminder or **no** to cancel.",
            )
            .with_buttons(&[ReplyButton::Confirm, ReplyButton::Cancel])),
        }
    }

    async fn parse_request(&self, user_id: &str, text: &str, now: DateTime<Utc>) -> Result<Reply> {
        let parsed = self.parser.parse(text, now);
        if !parsed.is_understood() {
            debug!("Could not parse request from {user_id}: {text:?}");
            return Ok(Reply::text(NOT_UNDERSTOOD));
        }
        self.ask_confirmation(user_id, parsed).await
    }

    async fn ask_confirmation(&self, user_id: &str, mut parsed: ParsedReminder) -> Result<Reply> {
        let Some(time) = parsed.time else {
            return Ok(Reply::text(NOT_UNDERSTOOD));
        };
        parsed.task = truncate_chars(&parsed.task, self.max_task_length);

        let language = self.store.get_user_language(user_id).await?;
        let mut content = format!(
            "🎯 **Reminder Confirmation** 🎯\n\n📝 **Task:** {}\n⏰ **Time:** {}\n",
            parsed.task,
            self.parser.format(time, &language)
        );
        if let Some(spec) = &parsed.recurrence {
            content.push_str(&format!("🔄 **Repeats:** {}\n", spec.describe()));
        }
        content.push_str("\nShall I set it? Reply **yes** or **no**.");

        self.sessions
            .set(user_id, SessionStage::AwaitingConfirmation { pending: parsed });
        Ok(Reply::text(content).with_buttons(&[ReplyButton::Confirm, ReplyButton::Cancel]))
    }

    async fn confirm(&self, user_id: &str, now: DateTime<Utc>) -> Result<Reply> {
        let pending = match self.sessions.get(user_id).map(|s| s.stage) {
            Some(SessionStage::AwaitingConfirmation { pending }) => pending,
            _ => return Ok(Reply::text("There's no reminder waiting for confirmation.")),
        };
        self.sessions.clear(user_id);

        let count = self.store.get_reminder_count(user_id).await?;
        if count >= self.max_reminders_per_user {
            return Ok(Reply::text(format!(
                "❌ You already have {count} active reminders (limit {}). Delete one with `!delete <id>` first.",
                self.max_reminders_per_user
            )));
        }

        let language = self.store.get_user_language(user_id).await?;
        let Some(reminder) = NewReminder::from_parsed(user_id, &pending, &language) else {
            return Ok(Reply::text(NOT_UNDERSTOOD));
        };
        let id = self.store.add_reminder(&reminder).await?;

        let seconds = reminder.scheduled_at.signed_duration_since(now).num_seconds();
        info!(
            "Created {} reminder {id} for user {user_id} in {} ({})",
            reminder.kind,
            format_duration(seconds.max(0)),
            reminder.scheduled_at
        );

        let when = self.parser.format(reminder.scheduled_at, &language);
        let mut content = format!(
            "✅ Reminder **#{id}** set! I'll remind you {} ({when}) about:\n> {}",
            relative(seconds),
            reminder.task
        );
        if let Some(spec) = &reminder.recurrence {
            content.push_str(&format!("\n🔄 Repeats {}", spec.describe()));
        }
        Ok(Reply::text(content).with_buttons(&[ReplyButton::NewReminder]))
    }

    async fn list_reminders(&self, user_id: &str, now: DateTime<Utc>) -> Result<Reply> {
        let reminders = self.store.get_user_reminders(user_id).await?;
        if reminders.is_empty() {
            return Ok(Reply::text(
                "📋 You don't have any active reminders.\n\nJust tell me something like `remind me to stretch in 1 hour`!",
            )
            .with_buttons(&[ReplyButton::NewReminder]));
        }

        let language = self.store.get_user_language(user_id).await?;
        let mut list = String::from("📋 **Your Active Reminders:**\n\n");
        for reminder in &reminders {
            let seconds = reminder.scheduled_at.signed_duration_since(now).num_seconds();
            let when = self.parser.format(reminder.scheduled_at, &language);
            list.push_str(&format!(
                "**#{}** - {} ({when})\n> {}\n",
                reminder.id,
                relative(seconds),
                reminder.task
            ));
            if let (ReminderKind::Recurring, Some(spec)) = (reminder.kind, &reminder.recurrence) {
                list.push_str(&format!("🔄 {}\n", spec.describe()));
            }
            list.push('\n');
        }
        list.push_str("*Use `!delete <id>` to delete a reminder.*");
        Ok(Reply::text(list))
    }

    async fn delete_reminder(&self, user_id: &str, args: &str) -> Result<Reply> {
        let Ok(id) = args.trim_start_matches('#').parse::<i64>() else {
            return Ok(Reply::text(
                "❌ Please provide a reminder ID, e.g. `!delete 3`. Use `!reminders` to see your reminder IDs.",
            ));
        };

        if self.store.delete_reminder(id, user_id).await? {
            info!("Deleted reminder {id} for user {user_id}");
            Ok(Reply::text(format!("✅ Deleted reminder #{id}.")))
        } else {
            Ok(Reply::text(format!(
                "❌ Reminder #{id} not found or doesn't belong to you."
            )))
        }
    }

    async fn handle_language(&self, user_id: &str, args: &str) -> Result<Reply> {
        let supported = SUPPORTED_LANGUAGES.join(", ");
        if args.is_empty() {
            let current = self.store.get_user_language(user_id).await?;
            return Ok(Reply::text(format!(
                "🌐 Your language is `{current}`. Supported: {supported}. Change it with `!language <code>`."
            )));
        }

        let requested = args.to_lowercase();
        if !SUPPORTED_LANGUAGES.contains(&requested.as_str()) {
            return Ok(Reply::text(format!(
                "❌ Unsupported language `{requested}`. Supported: {supported}."
            )));
        }

        let language = normalize_language(&requested);
        self.store.set_user_language(user_id, language).await?;
        info!("User {user_id} switched language to {language}");
        Ok(Reply::text(format!("✅ Language set to `{language}`.")))
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer, "yes" | "y" | "confirm" | "ok" | "haan")
}

fn is_no(answer: &str) -> bool {
    matches!(answer, "no" | "n" | "cancel" | "nahi")
}

fn relative(seconds: i64) -> String {
    if seconds > 0 {
        format!("in {}", format_duration(seconds))
    } else {
        "any moment now".to_string()
    }
}

/// Format a duration in seconds into a human-readable string
fn format_duration(seconds: i64) -> String {
    fn unit(value: i64, name: &str) -> String {
        format!("{} {}{}", value, name, if value == 1 { "" } else { "s" })
    }

    if seconds < 60 {
        unit(seconds, "second")
    } else if seconds < 3600 {
        unit(seconds / 60, "minute")
    } else if seconds < 86400 {
        let mins = (seconds % 3600) / 60;
        if mins > 0 {
            format!("{} {}", unit(seconds / 3600, "hour"), unit(mins, "minute"))
        } else {
            unit(seconds / 3600, "hour")
        }
    } else {
        let hours = (seconds % 86400) / 3600;
        if hours > 0 {
            format!("{} {}", unit(seconds / 86400, "day"), unit(hours, "hour"))
        } else {
            unit(seconds / 86400, "day")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use chrono::{TimeDelta, TimeZone};
    use std::time::Duration;

    async fn handler() -> RemindHandler {
        let db = Database::new(":memory:").await.unwrap();
        RemindHandler::new(
            Arc::new(db),
            TimeParser::default(),
            SessionStore::new(Duration::from_secs(60)),
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30), "30 seconds");
        assert_eq!(format_duration(1), "1 second");
        assert_eq!(format_duration(60), "1 minute");
        assert_eq!(format_duration(120), "2 minutes");
        assert_eq!(format_duration(3600), "1 hour");
        assert_eq!(format_duration(3660), "1 hour 1 minute");
        assert_eq!(format_duration(86400), "1 day");
        assert_eq!(format_duration(90000), "1 day 1 hour");
        assert_eq!(relative(0), "any moment now");
        assert_eq!(relative(-5), "any moment now");
    }

    #[test]
    fn test_button_ids() {
        for button in ReplyButton::ALL {
            assert_eq!(ReplyButton::from_custom_id(button.custom_id()), Some(button));
        }
        assert_eq!(ReplyButton::from_custom_id("confirm_delete"), None);
    }

    #[tokio::test]
    async fn test_one_shot_then_confirm() {
        let handler = handler().await;
        let reply = handler
            .handle_message("alice", "remind me to call mom in 30 minutes", now())
            .await
            .unwrap();
        assert!(reply.content.contains("call mom"));
        assert_eq!(reply.buttons, vec![ReplyButton::Confirm, ReplyButton::Cancel]);

        let reply = handler.handle_message("alice", "yes", now()).await.unwrap();
        assert!(reply.content.contains("#1"));
        assert!(reply.content.contains("in 30 minutes"));
        assert_eq!(reply.buttons, vec![ReplyButton::NewReminder]);

        let reminders = handler.store.get_user_reminders("alice").await.unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].task, "call mom");
        assert_eq!(reminders[0].scheduled_at, now() + TimeDelta::minutes(30));
        assert!(handler.sessions().get("alice").is_none());
    }

    #[tokio::test]
    async fn test_guided_flow() {
        let handler = handler().await;
        let reply = handler.handle_message("bob", "!remind", now()).await.unwrap();
        assert!(reply.content.contains("What should I remind you about"));

        let reply = handler.handle_message("bob", "water the plants", now()).await.unwrap();
        assert!(reply.content.contains("water the plants"));

        let reply = handler.handle_message("bob", "every day at 8pm", now()).await.unwrap();
        assert!(reply.content.contains("Repeats"));

        handler
            .handle_button("bob", ReplyButton::Confirm.custom_id(), now())
            .await
            .unwrap();
        let reminders = handler.store.get_user_reminders("bob").await.unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].kind, ReminderKind::Recurring);
        assert_eq!(reminders[0].task, "water the plants");
        assert_eq!(
            reminders[0].scheduled_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_guided_flow_retries_bad_time() {
        let handler = handler().await;
        handler.handle_message("bob", "!remind", now()).await.unwrap();
        handler.handle_message("bob", "stretch", now()).await.unwrap();

        let reply = handler.handle_message("bob", "whenever", now()).await.unwrap();
        assert_eq!(reply.content, NOT_UNDERSTOOD);
        assert_eq!(
            handler.sessions().get("bob").map(|s| s.stage),
            Some(SessionStage::AwaitingTime {
                task: "stretch".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_not_understood_saves_nothing() {
        let handler = handler().await;
        let reply = handler.handle_message("carol", "hello there", now()).await.unwrap();
        assert_eq!(reply.content, NOT_UNDERSTOOD);
        assert!(handler.sessions().get("carol").is_none());

        let reply = handler.handle_message("carol", "yes", now()).await.unwrap();
        assert!(reply.content.contains("no reminder waiting"));
        assert_eq!(handler.store.get_reminder_count("carol").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancel_abandons_pending() {
        let handler = handler().await;
        handler
            .handle_message("dave", "pay rent tomorrow at 9am", now())
            .await
            .unwrap();
        let reply = handler.handle_message("dave", "no", now()).await.unwrap();
        assert!(reply.content.contains("Cancelled"));
        assert_eq!(handler.store.get_reminder_count("dave").await.unwrap(), 0);

        let reply = handler.handle_message("dave", "!stop", now()).await.unwrap();
        assert_eq!(reply.content, "There's nothing to cancel.");
    }

    #[tokio::test]
    async fn test_reminder_limit() {
        let handler = handler().await.with_limits(1, 500);
        for _ in 0..2 {
            handler
                .handle_message("erin", "stretch in 10 minutes", now())
                .await
                .unwrap();
            handler.handle_message("erin", "yes", now()).await.unwrap();
        }
        assert_eq!(handler.store.get_reminder_count("erin").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_task_truncated() {
        let handler = handler().await.with_limits(50, 10);
        handler
            .handle_message("frank", "remind me to finish the quarterly report in 1 hour", now())
            .await
            .unwrap();
        handler.handle_message("frank", "yes", now()).await.unwrap();
        let reminders = handler.store.get_user_reminders("frank").await.unwrap();
        assert!(reminders[0].task.chars().count() <= 10);
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let handler = handler().await;
        let reply = handler.handle_message("gina", "!reminders", now()).await.unwrap();
        assert!(reply.content.contains("don't have any"));

        handler
            .handle_message("gina", "drink water every 2 hours", now())
            .await
            .unwrap();
        handler.handle_message("gina", "yes", now()).await.unwrap();

        let reply = handler.handle_message("gina", "!reminders", now()).await.unwrap();
        assert!(reply.content.contains("**#1**"));
        assert!(reply.content.contains("drink water"));
        assert!(reply.content.contains("in 2 hours"));

        let reply = handler.handle_message("henry", "!delete 1", now()).await.unwrap();
        assert!(reply.content.contains("not found"));
        let reply = handler.handle_message("gina", "!delete abc", now()).await.unwrap();
        assert!(reply.content.contains("provide a reminder ID"));
        let reply = handler.handle_message("gina", "!delete #1", now()).await.unwrap();
        assert!(reply.content.contains("Deleted reminder #1"));
        assert_eq!(handler.store.get_reminder_count("gina").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_language_command() {
        let handler = handler().await;
        let reply = handler.handle_message("ivy", "!language", now()).await.unwrap();
        assert!(reply.content.contains("`en`"));

        let reply = handler.handle_message("ivy", "!language fr", now()).await.unwrap();
        assert!(reply.content.contains("Unsupported"));

        handler.handle_message("ivy", "!language HI", now()).await.unwrap();
        assert_eq!(handler.store.get_user_language("ivy").await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_help_and_unknown_button() {
        let handler = handler().await;
        let reply = handler.handle_message("jo", "!help", now()).await.unwrap();
        assert!(reply.content.contains("!reminders"));

        let reply = handler.handle_button("jo", "bogus", now()).await.unwrap();
        assert_eq!(reply.content, "Unknown action.");

        let reply = handler
            .handle_button("jo", ReplyButton::NewReminder.custom_id(), now())
            .await
            .unwrap();
        assert!(reply.content.contains("What should I remind you about"));
    }
}
