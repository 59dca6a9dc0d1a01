//! Security event sink.
//!
//! Every login, lockout, session and lock transition is reported here with the
//! identity, time and outcome. [`ActivityLog`] is the default sink: it mirrors
//! each event into `tracing` and keeps a bounded history for `GET /logs`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64, Engine};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    LoginSuccess,
    LoginFailure,
    RateLimited,
    LoginRejectedLocked,
    SoftLockout,
    HardLockout,
    LockoutCleared,
    SessionIssued,
    SessionEvicted,
    SessionRevoked,
    SessionExpired,
    UnlockRequested,
    Unlocked,
    Locked,
    AutoLocked,
    SafetyInterrupt,
    Fault,
    FaultCleared,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub identity: String,
    pub outcome: String,
}

impl SecurityEvent {
    pub fn new(
        timestamp: DateTime<Utc>,
        kind: EventKind,
        identity: impl Into<String>,
        outcome: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            kind,
            identity: identity.into(),
            outcome: outcome.into(),
        }
    }
}

pub trait EventSink: Send + Sync {
    fn record(&self, event: SecurityEvent);
}

/// Short, non-reversible label for a bearer token, safe to log.
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    B64.encode(&digest[..6])
}

pub struct ActivityLog {
    entries: Mutex<VecDeque<SecurityEvent>>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Most recent events, newest last.
    pub fn recent(&self) -> Vec<SecurityEvent> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for ActivityLog {
    fn record(&self, event: SecurityEvent) {
        match event.kind {
            EventKind::Fault => error!(
                kind = ?event.kind, identity = %event.identity, outcome = %event.outcome,
                "security event"
            ),
            EventKind::LoginFailure
            | EventKind::RateLimited
            | EventKind::LoginRejectedLocked
            | EventKind::SoftLockout
            | EventKind::HardLockout
            | EventKind::SafetyInterrupt => warn!(
                kind = ?event.kind, identity = %event.identity, outcome = %event.outcome,
                "security event"
            ),
            _ => info!(
                kind = ?event.kind, identity = %event.identity, outcome = %event.outcome,
                "security event"
            ),
        }

        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(event);
    }
}
