//! # Reminders Feature
//!
//! Natural language reminder parsing, storage seam and the dispatch loop
//! that delivers due reminders.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Recurring reminders, guided sessions, calendar fallback, post-delivery hooks
//! - 1.0.0: One-time reminders with minute polling

pub mod calendar;
pub mod delivery;
pub mod notification;
pub mod recurrence;
pub mod reminder;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod time_parser;

pub use delivery::{FollowUpPrompt, NotificationOptions, Notifier, PostDeliveryHook};
pub use recurrence::RecurrenceSpec;
pub use reminder::{NewReminder, Reminder, ReminderKind};
pub use scheduler::{ReminderScheduler, TickReport};
pub use session::{ReminderSession, SessionStage, SessionStore};
pub use store::ReminderStore;
pub use time_parser::{ParsedReminder, ParserOptions, TimeParser};
