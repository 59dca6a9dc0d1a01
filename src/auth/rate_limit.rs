use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use chrono::{DateTime, Utc, Duration};
use serde::Serialize;

use crate::clock::Clock;
use crate::config::SecurityConfig;
use crate::error::AuthError;
use crate::events::{EventKind, EventSink, SecurityEvent};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window_size: Duration,
    pub max_requests_per_window: usize,
    pub max_login_attempts: u32,
    pub lockout_duration: Duration,
    pub max_failed_attempts_permanent: u32,
    /// Clean records untouched for this long may be dropped.
    pub idle_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_size: Duration::seconds(60),
            max_requests_per_window: 10,
            max_login_attempts: 3,
            lockout_duration: Duration::minutes(15),
            max_failed_attempts_permanent: 5,
            idle_timeout: Duration::minutes(30),
        }
    }
}

impl From<&SecurityConfig> for RateLimitConfig {
    fn from(config: &SecurityConfig) -> Self {
        Self {
            window_size: Duration::seconds(config.rate_limit_window_seconds),
            max_requests_per_window: config.max_requests_per_window,
            max_login_attempts: config.max_login_attempts,
            lockout_duration: Duration::minutes(config.lockout_duration_minutes),
            max_failed_attempts_permanent: config.max_failed_attempts_permanent,
            idle_timeout: Duration::milliseconds(config.auth_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockoutState {
    Clear,
    SoftLockout { until: DateTime<Utc> },
    HardLockout,
}

#[derive(Debug)]
struct RequestWindow {
    timestamps: Vec<DateTime<Utc>>,
}

impl RequestWindow {
    fn new() -> Self {
        Self {
            timestamps: Vec::new(),
        }
    }

    fn cleanup_old_requests(&mut self, now: DateTime<Utc>, window_size: Duration) {
        let cutoff = now - window_size;
        self.timestamps.retain(|ts| *ts > cutoff);
    }

    fn add_request(&mut self, now: DateTime<Utc>) {
        self.timestamps.push(now);
    }

    fn request_count(&self) -> usize {
        self.timestamps.len()
    }
}

/// Per-client attempt history. The sliding request window and the failure
/// counters are tracked separately: a success clears the counters but the
/// window keeps limiting request volume.
#[derive(Debug)]
struct LoginAttemptRecord {
    failure_count: u32,
    total_failures: u32,
    first_failure_time: Option<DateTime<Utc>>,
    lockout_until: Option<DateTime<Utc>>,
    permanent_lockout: bool,
    window: RequestWindow,
    last_seen: DateTime<Utc>,
}

impl LoginAttemptRecord {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            failure_count: 0,
            total_failures: 0,
            first_failure_time: None,
            lockout_until: None,
            permanent_lockout: false,
            window: RequestWindow::new(),
            last_seen: now,
        }
    }

    fn state(&self) -> LockoutState {
        if self.permanent_lockout {
            LockoutState::HardLockout
        } else if let Some(until) = self.lockout_until {
            LockoutState::SoftLockout { until }
        } else {
            LockoutState::Clear
        }
    }
}

pub struct RateLimiter {
    records: Arc<RwLock<HashMap<String, LoginAttemptRecord>>>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>, events: Arc<dyn EventSink>) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            config,
            clock,
            events,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Gate for a fresh login attempt from `client`. The attempt is always
    /// counted in the sliding window, and the window limit is enforced before
    /// any lockout state is consulted.
    pub async fn check_attempt(&self, client: &str) -> Result<(), AuthError> {
        let now = self.clock.now();
        let mut records = self.records.write().await;
        let record = records
            .entry(client.to_string())
            .or_insert_with(|| LoginAttemptRecord::new(now));

        record.last_seen = now;
        record.window.cleanup_old_requests(now, self.config.window_size);
        record.window.add_request(now);

        if record.window.request_count() > self.config.max_requests_per_window {
            self.emit(
                now,
                EventKind::RateLimited,
                client,
                format!("{} attempts in window", record.window.request_count()),
            );
            return Err(AuthError::RateLimited);
        }

        if record.permanent_lockout {
            self.emit(now, EventKind::LoginRejectedLocked, client, "permanent lockout");
            return Err(AuthError::PermanentlyLocked);
        }

        if let Some(until) = record.lockout_until {
            if now < until {
                self.emit(now, EventKind::LoginRejectedLocked, client, "temporary lockout");
                return Err(AuthError::temporarily_locked(until, now));
            }
            // One more failure puts the client straight back into lockout.
            record.lockout_until = None;
            record.failure_count = self.config.max_login_attempts.saturating_sub(1);
            self.emit(now, EventKind::LockoutCleared, client, "temporary lockout expired");
        }

        Ok(())
    }

    pub async fn record_failure(&self, client: &str) -> LockoutState {
        let now = self.clock.now();
        let mut records = self.records.write().await;
        let record = records
            .entry(client.to_string())
            .or_insert_with(|| LoginAttemptRecord::new(now));

        record.last_seen = now;
        record.failure_count += 1;
        record.total_failures += 1;
        record.first_failure_time.get_or_insert(now);

        if record.total_failures >= self.config.max_failed_attempts_permanent {
            if !record.permanent_lockout {
                record.permanent_lockout = true;
                record.lockout_until = None;
                self.emit(
                    now,
                    EventKind::HardLockout,
                    client,
                    format!("{} failed attempts", record.total_failures),
                );
            }
        } else if record.failure_count >= self.config.max_login_attempts {
            let until = now + self.config.lockout_duration;
            record.lockout_until = Some(until);
            self.emit(
                now,
                EventKind::SoftLockout,
                client,
                format!("{} failed attempts, locked until {}", record.failure_count, until),
            );
        }

        record.state()
    }

    /// Clears the failure counters after a verified login. A hard lockout is
    /// left in place.
    pub async fn record_success(&self, client: &str) {
        let now = self.clock.now();
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(client) {
            record.last_seen = now;
            if record.permanent_lockout {
                return;
            }
            record.failure_count = 0;
            record.total_failures = 0;
            record.first_failure_time = None;
            record.lockout_until = None;
        }
    }

    pub async fn state(&self, client: &str) -> LockoutState {
        let now = self.clock.now();
        let records = self.records.read().await;
        match records.get(client) {
            Some(record) => match record.state() {
                LockoutState::SoftLockout { until } if now >= until => LockoutState::Clear,
                state => state,
            },
            None => LockoutState::Clear,
        }
    }

    pub async fn failure_count(&self, client: &str) -> u32 {
        self.records
            .read()
            .await
            .get(client)
            .map(|r| r.failure_count)
            .unwrap_or(0)
    }

    /// Administrative reset: lifts any lockout for `client`. The request
    /// window is kept.
    pub async fn reset(&self, client: &str) {
        let now = self.clock.now();
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(client) {
            record.failure_count = 0;
            record.total_failures = 0;
            record.first_failure_time = None;
            record.lockout_until = None;
            record.permanent_lockout = false;
            self.emit(now, EventKind::LockoutCleared, client, "administrative reset");
        }
    }

    /// Drops idle records with nothing worth remembering. Hard lockouts are
    /// never dropped.
    pub async fn purge_idle(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| {
            let idle = now - record.last_seen > self.config.idle_timeout;
            let clean = record.failure_count == 0
                && record.lockout_until.is_none()
                && !record.permanent_lockout;
            !(idle && clean)
        });
        before - records.len()
    }

    pub async fn tracked_clients(&self) -> usize {
        self.records.read().await.len()
    }

    fn emit(&self, now: DateTime<Utc>, kind: EventKind, client: &str, outcome: impl Into<String>) {
        self.events.record(SecurityEvent::new(now, kind, client, outcome));
    }
}
