//! Notification text for delivered reminders
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Hindi layout, schedule line on recurring reminders
//! - 1.0.0: One-time and recurring notification blocks

use chrono::NaiveDateTime;

use super::reminder::{Reminder, ReminderKind};
use crate::core::response::truncate_for_message;

/// Language codes with their own strings
pub const SUPPORTED_LANGUAGES: [&str; 2] = ["en", "hi"];

pub const DEFAULT_LANGUAGE: &str = "en";

/// Map any language code onto a supported one
pub fn normalize_language(code: &str) -> &'static str {
    let code = code.trim().to_lowercase();
    SUPPORTED_LANGUAGES
        .iter()
        .find(|supported| **supported == code)
        .copied()
        .unwrap_or(DEFAULT_LANGUAGE)
}

struct Strings {
    one_time_heading: &'static str,
    recurring_heading: &'static str,
    task: &'static str,
    time: &'static str,
    schedule: &'static str,
    nudge: &'static str,
}

fn strings(language: &str) -> Strings {
    match normalize_language(language) {
        "hi" => Strings {
            one_time_heading: "🔔 **रिमाइंडर!** 🔔",
            recurring_heading: "🔄 **दोहराने वाला रिमाइंडर!** 🔄",
            task: "काम",
            time: "समय",
            schedule: "शेड्यूल",
            nudge: "💡 *इस काम को पूरा करना न भूलें!*",
        },
        _ => Strings {
            one_time_heading: "🔔 **REMINDER!** 🔔",
            recurring_heading: "🔄 **RECURRING REMINDER!** 🔄",
            task: "Task",
            time: "Time",
            schedule: "Schedule",
            nudge: "💡 *Don't forget to complete this task!*",
        },
    }
}

/// Render the message sent when `reminder` fires at `local_now`
pub fn render_notification(reminder: &Reminder, local_now: NaiveDateTime, language: &str) -> String {
    let s = strings(language);
    let heading = match reminder.kind {
        ReminderKind::OneTime => s.one_time_heading,
        ReminderKind::Recurring => s.recurring_heading,
    };

    let mut message = format!(
        "{heading}\n\n📝 **{}:** {}\n⏰ **{}:** {}\n",
        s.task,
        reminder.task,
        s.time,
        local_now.format("%I:%M %p")
    );
    if let Some(spec) = &reminder.recurrence {
        message.push_str(&format!("📅 **{}:** {}\n", s.schedule, spec.describe()));
    }
    message.push('\n');
    message.push_str(s.nudge);

    truncate_for_message(&message)
}
