//! # Command System
//!
//! Chat command and button handling for reminder conversations. Handlers
//! return transport-independent `Reply` values; the Discord layer renders them.
//!
//! - **Version**: 3.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 3.0.0: Guided reminder sessions, confirm/cancel and new-reminder buttons
//! - 2.0.0: `!reminders`, `!delete` and `!language` commands
//! - 1.0.0: Initial `!remind` command with natural-language times

pub mod remind;

pub use remind::{RemindHandler, Reply, ReplyButton};
