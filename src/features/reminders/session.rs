//! # Feature: Reminder Sessions
//!
//! Short-lived per-user conversation state for the guided reminder flow
//! (task, then time, then confirmation). Sessions are owned by a `SessionStore`
//! that the command handler passes around by reference; there is no global map.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.2.0
//! - **Toggleable**: false

use dashmap::DashMap;
use std::time::{Duration, Instant};

use super::time_parser::ParsedReminder;

/// Where a user is in the guided flow
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStage {
    /// Waiting for the user to say what to be reminded about
    AwaitingTask,
    /// Task captured, waiting for a time phrase
    AwaitingTime { task: String },
    /// Fully parsed, waiting for yes/no
    AwaitingConfirmation { pending: ParsedReminder },
}

/// One user's in-progress reminder
#[derive(Debug, Clone)]
pub struct ReminderSession {
    pub stage: SessionStage,
    expires_at: Instant,
}

impl ReminderSession {
    pub fn new(stage: SessionStage, ttl: Duration) -> Self {
        Self {
            stage,
            expires_at: Instant::now() + ttl,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Sessions keyed by user id, each expiring `ttl` after its last update
pub struct SessionStore {
    sessions: DashMap<String, ReminderSession>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Current session for a user; expired sessions are dropped and reported as absent
    pub fn get(&self, user_id: &str) -> Option<ReminderSession> {
        let now = Instant::now();
        let session = self.sessions.get(user_id).map(|entry| entry.clone())?;
        if session.is_expired(now) {
            self.sessions
                .remove_if(user_id, |_, session| session.is_expired(now));
            return None;
        }
        Some(session)
    }

    /// Replace the user's session, restarting its expiry clock
    pub fn set(&self, user_id: &str, stage: SessionStage) {
        self.sessions
            .insert(user_id.to_string(), ReminderSession::new(stage, self.ttl));
    }

    /// End a user's session. Returns whether a live session existed.
    pub fn clear(&self, user_id: &str) -> bool {
        self.sessions
            .remove(user_id)
            .is_some_and(|(_, session)| !session.is_expired(Instant::now()))
    }

    /// Drop every expired session, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired(now));
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
