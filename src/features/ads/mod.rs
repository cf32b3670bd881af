//! # Feature: Post-Reminder Ads
//!
//! Optionally shows an AdsGram advertisement after a reminder is delivered.
//! Disabled unless `ADS_ENABLED` is set and a block id is configured.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.1.0
//! - **Toggleable**: true

pub mod adsgram;

pub use adsgram::{parse_ad_response, render_ad, Ad, AdStats, AdsManager};
