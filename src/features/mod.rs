//! # Features
//!
//! - `reminders`: parsing, storage seam, dispatch loop and notifications
//! - `ads`: optional AdsGram ads shown after delivery

pub mod ads;
pub mod reminders;

pub use ads::AdsManager;
pub use reminders::{ReminderScheduler, TimeParser};
