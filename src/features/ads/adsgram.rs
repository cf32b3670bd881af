//! AdsGram client and the post-delivery hook that shows its ads
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.1.0

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, warn};
use regex::Regex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::core::config::AdsConfig;
use crate::features::reminders::delivery::{NotificationOptions, Notifier, PostDeliveryHook};
use crate::features::reminders::Reminder;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Body AdsGram returns when it has nothing to show
const NO_AD_MARKER: &str = "No available advertisement";

/// A displayable advertisement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ad {
    pub text: String,
    pub click_url: Option<String>,
    pub button_name: Option<String>,
}

/// Counters since startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdStats {
    pub shown: u64,
    pub empty: u64,
    pub errors: u64,
}

static HTML_TAG: OnceLock<Regex> = OnceLock::new();

fn strip_html(html: &str) -> String {
    let tag = HTML_TAG.get_or_init(|| Regex::new(r"(?i)<[^>]+>").expect("html tag pattern must compile"));
    let text = html
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n");
    tag.replace_all(&text, "").trim().to_string()
}

/// Interpret an AdsGram response body. `None` means there is no ad to show.
pub fn parse_ad_response(body: &str) -> Option<Ad> {
    let body = body.trim();
    if body.is_empty() || body.contains(NO_AD_MARKER) {
        return None;
    }

    let data: serde_json::Value = serde_json::from_str(body).ok()?;
    let data = data.as_object()?;
    let field = |name: &str| {
        data.get(name)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let text = field("text_html").map(|html| strip_html(&html));
    let click_url = field("click_url");
    let button_name = field("button_name");

    if text.is_none() && click_url.is_none() && button_name.is_none() {
        return None;
    }

    Some(Ad {
        text: text.unwrap_or_default(),
        click_url,
        button_name,
    })
}

/// Chat text for an ad, with the call to action as a markdown link
pub fn render_ad(ad: &Ad) -> String {
    let mut message = String::from("📢 **Sponsored**\n");
    if !ad.text.is_empty() {
        message.push('\n');
        message.push_str(&ad.text);
        message.push('\n');
    }
    if let Some(url) = &ad.click_url {
        let label = ad.button_name.as_deref().unwrap_or("Learn more");
        message.push_str(&format!("\n👉 [{label}]({url})"));
    }
    message
}

pub struct AdsManager {
    config: AdsConfig,
    client: reqwest::Client,
    notifier: Arc<dyn Notifier>,
    deliveries: DashMap<String, u32>,
    shown: AtomicU64,
    empty: AtomicU64,
    errors: AtomicU64,
}

impl AdsManager {
    pub fn new(config: AdsConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build AdsGram HTTP client")?;

        Ok(Self {
            config,
            client,
            notifier,
            deliveries: DashMap::new(),
            shown: AtomicU64::new(0),
            empty: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.config.frequency > 0 && self.config.block_id.is_some()
    }

    /// Count a delivery for `owner` and report whether this one gets an ad
    pub fn should_show_ad(&self, owner: &str) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let mut count = self.deliveries.entry(owner.to_string()).or_insert(0);
        *count += 1;
        *count % self.config.frequency == 0
    }

    /// Ask AdsGram for an ad
    pub async fn fetch_ad(&self, owner: &str, language: &str) -> Result<Option<Ad>> {
        let Some(block_id) = self.config.block_id.as_deref() else {
            return Ok(None);
        };

        let response = self
            .client
            .get(&self.config.api_url)
            .query(&[("tgid", owner), ("blockid", block_id), ("language", language)])
            .send()
            .await
            .context("AdsGram request failed")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read AdsGram response")?;
        if !status.is_success() {
            anyhow::bail!("AdsGram returned HTTP {status}: {body}");
        }

        debug!("AdsGram response for {owner}: {body}");
        Ok(parse_ad_response(&body))
    }

    pub fn stats(&self) -> AdStats {
        AdStats {
            shown: self.shown.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl PostDeliveryHook for AdsManager {
    fn name(&self) -> &'static str {
        "adsgram"
    }

    async fn after_delivery(&self, reminder: &Reminder, language: &str) -> Result<()> {
        if !self.should_show_ad(&reminder.owner) {
            return Ok(());
        }

        let ad = match self.fetch_ad(&reminder.owner, language).await {
            Ok(Some(ad)) => ad,
            Ok(None) => {
                self.empty.fetch_add(1, Ordering::Relaxed);
                debug!("No ad available for {}", reminder.owner);
                return Ok(());
            }
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                warn!("Failed to fetch ad for {}: {e:#}", reminder.owner);
                return Err(e);
            }
        };

        let options = NotificationOptions {
            silent: true,
            new_reminder_button: false,
        };
        self.notifier
            .send_notification(&reminder.owner, &render_ad(&ad), &options)
            .await?;
        self.shown.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
