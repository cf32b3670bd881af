//! Runtime configuration read from the environment (and `.env` via dotenvy)
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Ads settings, weekly alignment flag, session TTL
//! - 1.0.0: Discord token, database path, zone and scheduler interval

use anyhow::{anyhow, bail, Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ADSGRAM_API_URL: &str = "https://api.adsgram.ai/advbot";

/// Settings for post-reminder ads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdsConfig {
    pub enabled: bool,
    /// Show an ad on every Nth delivery per user
    pub frequency: u32,
    pub api_url: String,
    pub block_id: Option<String>,
}

impl Default for AdsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency: 1,
            api_url: DEFAULT_ADSGRAM_API_URL.to_string(),
            block_id: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub database_path: String,
    pub log_level: String,
    pub utc_offset: FixedOffset,
    pub tick_interval: Duration,
    pub max_reminders_per_user: i64,
    pub max_task_length: usize,
    pub session_ttl: Duration,
    pub align_weekly_first_occurrence: bool,
    pub ads: AdsConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; missing keys fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let discord_token =
            get("DISCORD_TOKEN").ok_or_else(|| anyhow!("DISCORD_TOKEN must be set"))?;

        let utc_offset = match get("REMINDER_UTC_OFFSET") {
            Some(raw) => parse_utc_offset(&raw)
                .with_context(|| format!("Invalid REMINDER_UTC_OFFSET: {raw}"))?,
            None => utc(),
        };

        let tick_seconds: u64 = parse_or(&get, "REMINDER_TICK_SECONDS", 60)?;
        if tick_seconds == 0 {
            bail!("REMINDER_TICK_SECONDS must be at least 1");
        }

        let ads = AdsConfig {
            enabled: parse_bool_or(&get, "ADS_ENABLED", false)?,
            frequency: parse_or(&get, "ADS_FREQUENCY", 1)?,
            api_url: get("ADSGRAM_API_URL").unwrap_or_else(|| DEFAULT_ADSGRAM_API_URL.to_string()),
            block_id: get("ADSGRAM_BLOCK_ID"),
        };

        Ok(Self {
            discord_token,
            database_path: get("DATABASE_PATH").unwrap_or_else(|| "reminders.db".to_string()),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            utc_offset,
            tick_interval: Duration::from_secs(tick_seconds),
            max_reminders_per_user: parse_or(&get, "MAX_REMINDERS_PER_USER", 50)?,
            max_task_length: parse_or(&get, "REMINDER_MESSAGE_LENGTH", 500)?,
            session_ttl: Duration::from_secs(parse_or(&get, "REMINDER_SESSION_TTL_SECONDS", 600)?),
            align_weekly_first_occurrence: parse_bool_or(&get, "REMINDER_ALIGN_WEEKLY", true)?,
            ads,
        })
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow!("Invalid {key} ({raw}): {e}")),
        None => Ok(default),
    }
}

fn parse_bool_or<G>(get: &G, key: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_lowercase()).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(anyhow!("Invalid {key}: {other} (expected true/false)")),
    }
}

/// Parse `UTC`, `Z`, `+05:30`, `-0800`, `+5` or `UTC+05:30`
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let raw = raw.trim();
    let rest = raw
        .strip_prefix("UTC")
        .or_else(|| raw.strip_prefix("utc"))
        .or_else(|| raw.strip_prefix("GMT"))
        .unwrap_or(raw);
    if rest.is_empty() || rest == "Z" {
        return Ok(utc());
    }

    let (sign, digits) = if let Some(digits) = rest.strip_prefix('+') {
        (1, digits)
    } else if let Some(digits) = rest.strip_prefix('-') {
        (-1, digits)
    } else {
        bail!("Offset must start with + or -");
    };

    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None if digits.len() == 4 && digits.is_ascii() => digits.split_at(2),
        None => (digits, "0"),
    };
    let hours: i32 = hours.parse().context("Invalid offset hours")?;
    let minutes: i32 = minutes.parse().context("Invalid offset minutes")?;
    if hours > 14 || minutes > 59 {
        bail!("Offset out of range");
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| anyhow!("Offset out of range"))
}
