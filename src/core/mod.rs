//! # Core Module
//!
//! Configuration and chat message helpers shared by the bot and the scheduler.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Character truncation for reminder tasks
//! - 1.0.0: Initial creation with config and response modules

pub mod config;
pub mod response;

// Re-export commonly used items
pub use config::{AdsConfig, Config};
pub use response::{chunk_for_message, chunk_text, truncate_chars, truncate_for_message, MESSAGE_LIMIT};
