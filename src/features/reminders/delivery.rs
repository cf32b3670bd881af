//! Messaging seam used by the dispatch loop, plus the follow-up prompt hook.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::reminder::{Reminder, ReminderKind};

/// Text of the prompt sent after a one-time reminder fires
pub const FOLLOW_UP_PROMPT: &str = "💡 *Want to set another reminder?*";

/// How a notification should be presented
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationOptions {
    /// Deliver without a push/ping
    pub silent: bool,
    /// Attach a "Set New Reminder" button
    pub new_reminder_button: bool,
}

/// Delivers rendered text to a user
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_notification(
        &self,
        owner: &str,
        text: &str,
        options: &NotificationOptions,
    ) -> Result<()>;
}

/// Extra work after a reminder has been delivered.
///
/// Runs best-effort: errors are logged by the dispatch loop and never undo or
/// block the delivery itself.
#[async_trait]
pub trait PostDeliveryHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn after_delivery(&self, reminder: &Reminder, language: &str) -> Result<()>;
}

/// Offers a "Set New Reminder" button once a one-time reminder is done
pub struct FollowUpPrompt {
    notifier: Arc<dyn Notifier>,
}

impl FollowUpPrompt {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl PostDeliveryHook for FollowUpPrompt {
    fn name(&self) -> &'static str {
        "follow_up_prompt"
    }

    async fn after_delivery(&self, reminder: &Reminder, _language: &str) -> Result<()> {
        // Recurring notifications already carry the button
        if reminder.kind != ReminderKind::OneTime {
            return Ok(());
        }

        let options = NotificationOptions {
            silent: true,
            new_reminder_button: true,
        };
        self.notifier
            .send_notification(&reminder.owner, FOLLOW_UP_PROMPT, &options)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String, NotificationOptions)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_notification(
            &self,
            owner: &str,
            text: &str,
            options: &NotificationOptions,
        ) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((owner.to_string(), text.to_string(), *options));
            Ok(())
        }
    }

    fn reminder(kind: ReminderKind) -> Reminder {
        Reminder {
            id: 7,
            owner: "42".to_string(),
            task: "stretch".to_string(),
            scheduled_at: Utc::now(),
            kind,
            recurrence: None,
            language: "en".to_string(),
            active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_follow_up_after_one_time() {
        let notifier = Arc::new(RecordingNotifier::default());
        let hook = FollowUpPrompt::new(notifier.clone());

        hook.after_delivery(&reminder(ReminderKind::OneTime), "en")
            .await
            .unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "42");
        assert_eq!(sent[0].1, FOLLOW_UP_PROMPT);
        assert!(sent[0].2.new_reminder_button);
    }

    #[tokio::test]
    async fn test_no_follow_up_after_recurring() {
        let notifier = Arc::new(RecordingNotifier::default());
        let hook = FollowUpPrompt::new(notifier.clone());

        hook.after_delivery(&reminder(ReminderKind::Recurring), "en")
            .await
            .unwrap();

        assert!(notifier.sent.lock().unwrap().is_empty());
    }
}
