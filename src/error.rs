use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Lock error: {0}")]
    LockError(#[from] LockError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<ActuatorError> for AppError {
    fn from(err: ActuatorError) -> Self {
        AppError::LockError(LockError::ActuationFailed(err))
    }
}

impl AppError {
    /// Text returned to the caller. Authentication failures stay vague; the
    /// event sink gets the full story.
    fn public_message(&self) -> String {
        match self {
            AppError::AuthError(AuthError::InvalidCredentials) => "Invalid credentials".into(),
            AppError::AuthError(AuthError::SessionInvalid) => "Authentication required".into(),
            AppError::AuthError(AuthError::RateLimited) => "Too many requests".into(),
            AppError::AuthError(AuthError::TemporarilyLocked { .. })
            | AppError::AuthError(AuthError::PermanentlyLocked) => "Access locked".into(),
            AppError::LockError(LockError::Busy) => "Lock is moving, try again".into(),
            AppError::LockError(LockError::Interrupted) => "Unlock interrupted by safety lock".into(),
            AppError::LockError(LockError::ActuationFailed(_)) | AppError::LockError(LockError::Fault) => {
                "Lock hardware fault".into()
            }
            AppError::Forbidden(_) => "Forbidden".into(),
            AppError::ValidationError(msg) => msg.clone(),
            AppError::ConfigError(_) | AppError::InternalError(_) => "Internal server error".into(),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut body = json!({
            "success": false,
            "message": self.public_message(),
        });
        if let AppError::AuthError(AuthError::TemporarilyLocked { retry_after_secs, .. }) = self {
            body["retryAfterSeconds"] = json!(retry_after_secs);
        }
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::SessionInvalid => StatusCode::UNAUTHORIZED,
                AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                AuthError::TemporarilyLocked { .. } => StatusCode::LOCKED,
                AuthError::PermanentlyLocked => StatusCode::LOCKED,
            },
            AppError::LockError(e) => match e {
                LockError::Busy | LockError::Interrupted => StatusCode::CONFLICT,
                LockError::ActuationFailed(_) | LockError::Fault => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::ConfigError(_) | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Rate limited")]
    RateLimited,

    #[error("Temporarily locked until {until}")]
    TemporarilyLocked {
        until: DateTime<Utc>,
        retry_after_secs: i64,
    },

    #[error("Permanently locked")]
    PermanentlyLocked,

    #[error("Session invalid")]
    SessionInvalid,
}

impl AuthError {
    /// Soft lockout as seen at `now`.
    pub fn temporarily_locked(until: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        AuthError::TemporarilyLocked {
            until,
            retry_after_secs: (until - now).num_seconds().max(0),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("Actuator busy")]
    Busy,

    #[error("Unlock interrupted by safety lock")]
    Interrupted,

    #[error("Actuation failed: {0}")]
    ActuationFailed(ActuatorError),

    #[error("Lock in fault state")]
    Fault,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActuatorError {
    #[error("GPIO write failed on pin {pin}: {reason}")]
    Gpio { pin: u8, reason: String },

    #[error("Invalid actuator configuration: {0}")]
    InvalidConfig(String),

    #[error("Actuation sequence aborted: {0}")]
    Aborted(String),
}
