//! # Feature: Reminder Dispatch Loop
//!
//! Polls the store for due reminders and delivers them. One-time reminders are
//! deactivated right after delivery; recurring ones are moved to their next
//! occurrence. Ticks never overlap and a shutdown request is only honoured
//! between ticks.
//!
//! - **Version**: 2.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Store/notifier traits, post-delivery hooks, recurring reschedule, graceful shutdown
//! - 1.0.0: Minute polling loop

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::delivery::{NotificationOptions, Notifier, PostDeliveryHook};
use super::notification::render_notification;
use super::reminder::{Reminder, ReminderKind};
use super::store::ReminderStore;

/// Default polling interval
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub due: usize,
    pub delivered: usize,
    pub failed: usize,
}

pub struct ReminderScheduler {
    store: Arc<dyn ReminderStore>,
    notifier: Arc<dyn Notifier>,
    hooks: Vec<Arc<dyn PostDeliveryHook>>,
    utc_offset: FixedOffset,
    tick_interval: Duration,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        notifier: Arc<dyn Notifier>,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            notifier,
            hooks: Vec::new(),
            utc_offset,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Add a hook that runs after every successful delivery
    pub fn with_hook(mut self, hook: Arc<dyn PostDeliveryHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Tick until `shutdown` flips to true (or its sender is dropped)
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Reminder scheduler started (interval: {}s, hooks: {})",
            self.tick_interval.as_secs(),
            self.hooks.len()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = interval.tick() => {
                    let report = self.tick(Utc::now()).await;
                    if report.due > 0 {
                        info!(
                            "Reminder tick: {} due, {} delivered, {} failed",
                            report.due, report.delivered, report.failed
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Reminder scheduler stopped");
    }

    /// Deliver everything due at `now`
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let due = match self.store.get_due_reminders(now).await {
            Ok(due) => due,
            Err(e) => {
                error!("Failed to load due reminders: {e:#}");
                return TickReport::default();
            }
        };

        let mut report = TickReport {
            due: due.len(),
            ..TickReport::default()
        };

        for reminder in &due {
            debug!(
                "Dispatching reminder {} ({}) for user {}",
                reminder.id, reminder.kind, reminder.owner
            );
            match self.dispatch(reminder, now).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    error!("Reminder {} not completed: {e:#}", reminder.id);
                }
            }
        }

        report
    }

    async fn dispatch(&self, reminder: &Reminder, now: DateTime<Utc>) -> Result<()> {
        let text = render_notification(reminder, self.local(now), &reminder.language);
        let options = NotificationOptions {
            silent: false,
            new_reminder_button: reminder.kind == ReminderKind::Recurring,
        };

        self.notifier
            .send_notification(&reminder.owner, &text, &options)
            .await
            .with_context(|| format!("Failed to deliver reminder {}", reminder.id))?;

        let state = match reminder.kind {
            ReminderKind::OneTime => self
                .store
                .mark_one_time_sent(reminder.id)
                .await
                .with_context(|| format!("Failed to mark reminder {} as sent", reminder.id)),
            ReminderKind::Recurring => self.advance(reminder, now).await,
        };

        for hook in &self.hooks {
            if let Err(e) = hook.after_delivery(reminder, &reminder.language).await {
                warn!(
                    "Post-delivery hook {} failed for reminder {}: {e:#}",
                    hook.name(),
                    reminder.id
                );
            }
        }

        state
    }

    /// Move a recurring reminder to its next occurrence
    async fn advance(&self, reminder: &Reminder, now: DateTime<Utc>) -> Result<()> {
        let from = self.local(now.max(reminder.scheduled_at));
        let next = reminder
            .recurrence
            .and_then(|spec| spec.next_after(from))
            .and_then(|next| self.to_utc(next));

        match next {
            Some(next) => {
                debug!("Reminder {} next fires at {}", reminder.id, next);
                self.store
                    .reschedule(reminder.id, next)
                    .await
                    .with_context(|| format!("Failed to reschedule reminder {}", reminder.id))
            }
            None => {
                warn!(
                    "Recurring reminder {} has no further occurrences, deactivating",
                    reminder.id
                );
                self.store
                    .delete_reminder(reminder.id, &reminder.owner)
                    .await
                    .map(|_| ())
            }
        }
    }

    fn local(&self, time: DateTime<Utc>) -> NaiveDateTime {
        time.with_timezone(&self.utc_offset).naive_local()
    }

    fn to_utc(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.utc_offset
            .from_local_datetime(&local)
            .single()
            .map(|t| t.with_timezone(&Utc))
    }
}
