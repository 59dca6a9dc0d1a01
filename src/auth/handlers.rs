use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, AuthError};
use crate::events::SecurityEvent;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub success: bool,
    pub entries: Vec<SecurityEvent>,
}

/// Bearer token from the `Authorization` header.
pub fn bearer_token(req: &HttpRequest) -> Result<&str, AppError> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::AuthError(AuthError::SessionInvalid))
}

/// Source address of the caller, checked against the trusted list when one
/// is configured. Forwarding headers are ignored.
pub fn client_address(req: &HttpRequest, state: &AppState) -> Result<String, AppError> {
    let addr = req
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let trusted = &state.config.server.trusted_ips;
    if !trusted.is_empty() && !trusted.iter().any(|ip| ip == &addr) {
        warn!("Rejected request from untrusted address {}", addr);
        return Err(AppError::Forbidden(format!("address {} not trusted", addr)));
    }
    Ok(addr)
}

pub async fn login(
    req: HttpRequest,
    body: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let client = client_address(&req, &state)?;
    let (username, password) = match (&body.username, &body.password) {
        (Some(u), Some(p)) => (u.as_str(), p.as_str()),
        _ => return Err(AppError::ValidationError("username and password are required".into())),
    };

    info!("Received login request from {}", client);
    match state.auth.login(&client, username, password).await {
        Ok(session) => {
            info!("Login successful for {} from {}", session.identity, client);
            Ok(HttpResponse::Ok().json(LoginResponse {
                success: true,
                token: session.token,
                message: "Login successful".into(),
                expires_at: session.expires_at,
            }))
        }
        Err(e) => {
            warn!("Login failed from {}: {}", client, e);
            Err(e.into())
        }
    }
}

pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    client_address(&req, &state)?;
    let token = bearer_token(&req)?;

    state.auth.logout(token).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Successfully logged out"
    })))
}

pub async fn logs(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    client_address(&req, &state)?;
    let token = bearer_token(&req)?;
    state.auth.authorize(token).await?;

    Ok(HttpResponse::Ok().json(LogsResponse {
        success: true,
        entries: state.activity.recent(),
    }))
}
