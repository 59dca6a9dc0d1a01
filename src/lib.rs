pub mod actuator;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod lock;

use std::sync::Arc;
use actix_web::{web, HttpResponse};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use actuator::{build_driver, ActuatorDriver, GpioBackend, LoggingGpio};
pub use auth::{AuthService, CredentialStore, RateLimitConfig, RateLimiter, SessionConfig, SessionManager};
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{ActivityLog, EventSink};
pub use lock::{LockController, LockState, LockTiming};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Registers every route of the lock API.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/login", web::post().to(auth::handlers::login))
        .route("/logout", web::post().to(auth::handlers::logout))
        .route("/logs", web::get().to(auth::handlers::logs))
        .route("/unlock", web::post().to(lock::handlers::unlock))
        .route("/status", web::get().to(lock::handlers::status));
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub auth: Arc<AuthService>,
    pub lock: Arc<LockController>,
    pub activity: Arc<ActivityLog>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// State backed by the system clock and simulated GPIO.
    pub fn new(config: Settings) -> Result<Self> {
        let driver = build_driver(&config.actuator, Box::new(LoggingGpio::new()))?;
        Self::with_parts(config, driver, Arc::new(SystemClock))
    }

    pub fn with_parts(
        config: Settings,
        driver: Box<dyn ActuatorDriver>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let activity = Arc::new(ActivityLog::new(config.logging.max_entries));
        let events: Arc<dyn EventSink> = activity.clone();

        let credentials = CredentialStore::from_config(&config.credentials);
        let limiter = RateLimiter::new(
            RateLimitConfig::from(&config.security),
            clock.clone(),
            events.clone(),
        );
        let sessions = SessionManager::new(
            SessionConfig::try_from(&config.security)?,
            clock.clone(),
            events.clone(),
        );
        let auth = AuthService::new(credentials, limiter, sessions, clock.clone(), events.clone());

        let lock = LockController::new(
            driver,
            LockTiming::from(&config.lock),
            clock.clone(),
            events,
        );

        Ok(Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            lock: Arc::new(lock),
            activity,
            clock,
        })
    }

    /// Drops expired sessions and idle rate-limit records. Returns how many
    /// of each were removed.
    pub async fn housekeeping(&self) -> (usize, usize) {
        let now = self.clock.now();
        let sessions = self.auth.sessions().sweep(now).await;
        let records = self.auth.limiter().purge_idle(now).await;
        (sessions, records)
    }
}
