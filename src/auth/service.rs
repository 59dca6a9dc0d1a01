use std::sync::Arc;

use crate::auth::credentials::{CredentialStore, Role};
use crate::auth::rate_limit::{LockoutState, RateLimiter};
use crate::auth::session::{Session, SessionManager};
use crate::clock::Clock;
use crate::error::AuthError;
use crate::events::{EventKind, EventSink, SecurityEvent};

/// Login pipeline: rate limiter, then credential check, then session issue.
///
/// `client` is the rate-limit key (the caller's source address); the session
/// identity is the verified username.
pub struct AuthService {
    credentials: CredentialStore,
    limiter: RateLimiter,
    sessions: SessionManager,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl AuthService {
    pub fn new(
        credentials: CredentialStore,
        limiter: RateLimiter,
        sessions: SessionManager,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            credentials,
            limiter,
            sessions,
            clock,
            events,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub async fn login(&self, client: &str, username: &str, password: &str) -> Result<Session, AuthError> {
        match self.limiter.check_attempt(client).await {
            Ok(()) => {}
            Err(locked @ (AuthError::TemporarilyLocked { .. } | AuthError::PermanentlyLocked)) => {
                // The override secret is the only way past a lockout
                if let Some(verified) = self.credentials.verify_override(password) {
                    self.emit(
                        EventKind::LoginSuccess,
                        &verified.identity,
                        format!("emergency override from {} during lockout", client),
                    );
                    return Ok(self.sessions.issue(&verified.identity, verified.role).await);
                }
                return Err(locked);
            }
            Err(e) => return Err(e),
        }

        match self.credentials.check(username, password) {
            Ok(verified) => {
                if verified.role != Role::EmergencyOverride {
                    self.limiter.record_success(client).await;
                }
                self.emit(
                    EventKind::LoginSuccess,
                    &verified.identity,
                    format!("{:?} login from {}", verified.role, client),
                );
                Ok(self.sessions.issue(&verified.identity, verified.role).await)
            }
            Err(rejection) => {
                let state = self.limiter.record_failure(client).await;
                self.emit(
                    EventKind::LoginFailure,
                    username,
                    format!("{} from {}", rejection, client),
                );
                Err(match state {
                    LockoutState::Clear => AuthError::InvalidCredentials,
                    LockoutState::SoftLockout { until } => {
                        AuthError::temporarily_locked(until, self.clock.now())
                    }
                    LockoutState::HardLockout => AuthError::PermanentlyLocked,
                })
            }
        }
    }

    pub async fn authorize(&self, token: &str) -> Result<Session, AuthError> {
        self.sessions.validate(token).await
    }

    pub async fn logout(&self, token: &str) -> bool {
        self.sessions.revoke(token).await
    }

    fn emit(&self, kind: EventKind, identity: &str, outcome: String) {
        self.events
            .record(SecurityEvent::new(self.clock.now(), kind, identity, outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::rate_limit::RateLimitConfig;
    use crate::auth::session::SessionConfig;
    use crate::clock::ManualClock;
    use crate::events::ActivityLog;
    use chrono::Duration;
    use tokio_test::{assert_err, assert_ok};

    const PASSWORD: &str = "DoorUnlock2025!@#";
    const OVERRIDE: &str = "EmergencyAccess2025!@#$%";

    fn service() -> (AuthService, ManualClock, Arc<ActivityLog>) {
        let clock = ManualClock::default();
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let log = Arc::new(ActivityLog::new(100));
        let events: Arc<dyn EventSink> = log.clone();
        let credentials = CredentialStore::new(
            vec![("admin".into(), PASSWORD.into(), Role::Primary)],
            Some(OVERRIDE.into()),
        );
        let service = AuthService::new(
            credentials,
            RateLimiter::new(RateLimitConfig::default(), shared_clock.clone(), events.clone()),
            SessionManager::new(SessionConfig::default(), shared_clock.clone(), events.clone()),
            shared_clock,
            events,
        );
        (service, clock, log)
    }

    #[tokio::test]
    async fn test_login_then_authorize_then_logout() {
        let (service, _, log) = service();
        let session = assert_ok!(service.login("10.0.0.1", "admin", PASSWORD).await);
        let authorized = assert_ok!(service.authorize(&session.token).await);
        assert_eq!(authorized.identity, "admin");

        assert!(service.logout(&session.token).await);
        assert_eq!(service.authorize(&session.token).await.unwrap_err(), AuthError::SessionInvalid);
        assert!(log.recent().iter().any(|e| e.kind == EventKind::LoginSuccess));
    }

    #[tokio::test]
    async fn test_three_failures_lock_out_even_correct_password() {
        let (service, clock, log) = service();
        for _ in 0..2 {
            assert_eq!(
                service.login("10.0.0.1", "admin", "wrong").await.unwrap_err(),
                AuthError::InvalidCredentials
            );
        }
        let third = service.login("10.0.0.1", "admin", "wrong").await.unwrap_err();
        assert!(matches!(third, AuthError::TemporarilyLocked { .. }));

        let fourth = service.login("10.0.0.1", "admin", PASSWORD).await.unwrap_err();
        assert!(matches!(fourth, AuthError::TemporarilyLocked { .. }));

        // A different client is not affected
        assert_ok!(service.login("10.0.0.2", "admin", PASSWORD).await);

        clock.advance(Duration::minutes(15));
        assert_ok!(service.login("10.0.0.1", "admin", PASSWORD).await);
        assert_eq!(service.limiter().failure_count("10.0.0.1").await, 0);
        assert_eq!(
            log.recent().iter().filter(|e| e.kind == EventKind::LoginFailure).count(),
            3
        );
    }

    #[tokio::test]
    async fn test_failure_reason_goes_to_event_sink_only() {
        let (service, _, log) = service();
        let unknown = service.login("10.0.0.1", "ghost", PASSWORD).await.unwrap_err();
        let wrong = service.login("10.0.0.1", "admin", "wrong").await.unwrap_err();
        assert_eq!(unknown, wrong);
        assert_eq!(unknown, AuthError::InvalidCredentials);

        let outcomes: Vec<String> = log
            .recent()
            .into_iter()
            .filter(|e| e.kind == EventKind::LoginFailure)
            .map(|e| e.outcome)
            .collect();
        assert_eq!(
            outcomes,
            vec!["unknown username from 10.0.0.1", "wrong password from 10.0.0.1"]
        );
    }

    #[tokio::test]
    async fn test_permanent_lockout_until_reset() {
        let (service, clock, _) = service();
        for _ in 0..3 {
            let _ = service.login("c", "admin", "wrong").await;
        }
        clock.advance(Duration::minutes(16));
        let _ = service.login("c", "admin", "wrong").await;
        clock.advance(Duration::minutes(16));
        assert_eq!(
            service.login("c", "admin", "wrong").await.unwrap_err(),
            AuthError::PermanentlyLocked
        );

        clock.advance(Duration::days(30));
        assert_eq!(
            service.login("c", "admin", PASSWORD).await.unwrap_err(),
            AuthError::PermanentlyLocked
        );

        service.limiter().reset("c").await;
        assert_ok!(service.login("c", "admin", PASSWORD).await);
    }

    #[tokio::test]
    async fn test_override_passes_lockout_but_not_rate_limit() {
        let (service, _, _) = service();
        for _ in 0..5 {
            let _ = service.login("c", "admin", "wrong").await;
        }
        let session = assert_ok!(service.login("c", "anyone", OVERRIDE).await);
        assert_eq!(session.role, Role::EmergencyOverride);
        // Lockout record untouched
        assert!(matches!(
            service.limiter().state("c").await,
            LockoutState::SoftLockout { .. }
        ));

        for _ in 0..10 {
            let _ = service.login("c", "anyone", OVERRIDE).await;
        }
        assert_eq!(service.login("c", "anyone", OVERRIDE).await.unwrap_err(), AuthError::RateLimited);
    }

    #[tokio::test]
    async fn test_rate_limit_blocks_before_verification() {
        let (service, _, log) = service();
        for _ in 0..10 {
            let _ = service.login("c", "admin", PASSWORD).await;
        }
        assert_err!(service.login("c", "admin", PASSWORD).await);
        // The rejected attempt never reached the credential store
        assert_eq!(
            log.recent().iter().filter(|e| e.kind == EventKind::LoginSuccess).count(),
            10
        );
    }
}
