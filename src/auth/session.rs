use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, Rng};
use serde::Serialize;
use tracing::debug;

use crate::auth::credentials::Role;
use crate::clock::Clock;
use crate::config::SecurityConfig;
use crate::error::{AppError, AuthError};
use crate::events::{token_fingerprint, EventKind, EventSink, SecurityEvent};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub session_timeout: Duration,
    pub refresh_interval: Duration,
    pub max_concurrent_sessions: usize,
    pub token_length: usize,
    pub token_alphabet: Vec<char>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::minutes(30),
            refresh_interval: Duration::minutes(5),
            max_concurrent_sessions: 2,
            token_length: 32,
            token_alphabet: "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789"
                .chars()
                .collect(),
        }
    }
}

impl TryFrom<&SecurityConfig> for SessionConfig {
    type Error = AppError;

    fn try_from(config: &SecurityConfig) -> Result<Self, Self::Error> {
        let token_alphabet: Vec<char> = config.token_alphabet.chars().collect();
        if token_alphabet.len() < 2 || config.token_length == 0 {
            return Err(AppError::ConfigError("unusable token alphabet or length".into()));
        }
        Ok(Self {
            session_timeout: Duration::minutes(config.session_timeout_minutes),
            refresh_interval: Duration::milliseconds(config.session_refresh_interval_ms),
            max_concurrent_sessions: config.max_concurrent_sessions.max(1),
            token_length: config.token_length,
            token_alphabet,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    #[serde(skip_serializing)]
    pub token: String,
    pub identity: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Bearer-token sessions, keyed by token. One lock guards the whole table so
/// issuing, refreshing and revoking never race on per-identity counts.
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl SessionManager {
    pub fn new(config: SessionConfig, clock: Arc<dyn Clock>, events: Arc<dyn EventSink>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config,
            clock,
            events,
        }
    }

    fn generate_token(&self) -> String {
        let alphabet = &self.config.token_alphabet;
        (0..self.config.token_length)
            .map(|_| alphabet[OsRng.gen_range(0..alphabet.len())])
            .collect()
    }

    pub async fn issue(&self, identity: &str, role: Role) -> Session {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;

        let mut held: Vec<(String, DateTime<Utc>)> = sessions
            .iter()
            .filter(|(_, s)| s.identity == identity && !s.is_expired(now))
            .map(|(token, s)| (token.clone(), s.last_activity_at))
            .collect();
        held.sort_by_key(|(_, last_activity)| *last_activity);

        let excess = (held.len() + 1).saturating_sub(self.config.max_concurrent_sessions);
        for (token, _) in held.into_iter().take(excess) {
            sessions.remove(&token);
            self.events.record(SecurityEvent::new(
                now,
                EventKind::SessionEvicted,
                identity,
                format!("session {} evicted by concurrent-session cap", token_fingerprint(&token)),
            ));
        }

        let mut token = self.generate_token();
        while sessions.contains_key(&token) {
            debug!("Token collision, regenerating");
            token = self.generate_token();
        }

        let session = Session {
            token: token.clone(),
            identity: identity.to_string(),
            role,
            created_at: now,
            last_activity_at: now,
            expires_at: now + self.config.session_timeout,
        };
        sessions.insert(token.clone(), session.clone());

        self.events.record(SecurityEvent::new(
            now,
            EventKind::SessionIssued,
            identity,
            format!("session {}", token_fingerprint(&token)),
        ));
        session
    }

    /// Looks the token up and slides its expiry forward when the last
    /// refresh is older than the refresh interval.
    pub async fn validate(&self, token: &str) -> Result<Session, AuthError> {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;

        let session = sessions.get_mut(token).ok_or(AuthError::SessionInvalid)?;
        if session.is_expired(now) {
            let identity = session.identity.clone();
            sessions.remove(token);
            self.events.record(SecurityEvent::new(
                now,
                EventKind::SessionExpired,
                identity,
                format!("session {}", token_fingerprint(token)),
            ));
            return Err(AuthError::SessionInvalid);
        }

        if now - session.last_activity_at > self.config.refresh_interval {
            session.last_activity_at = now;
            session.expires_at = now + self.config.session_timeout;
        }
        Ok(session.clone())
    }

    pub async fn revoke(&self, token: &str) -> bool {
        let now = self.clock.now();
        match self.sessions.write().await.remove(token) {
            Some(session) => {
                self.events.record(SecurityEvent::new(
                    now,
                    EventKind::SessionRevoked,
                    session.identity,
                    format!("session {}", token_fingerprint(token)),
                ));
                true
            }
            None => false,
        }
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at >= now);
        before - sessions.len()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn sessions_for(&self, identity: &str) -> Vec<Session> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.identity == identity)
            .cloned()
            .collect()
    }
}
