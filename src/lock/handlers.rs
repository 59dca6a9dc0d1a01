use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::auth::handlers::{bearer_token, client_address};
use crate::error::{AppError, LockError};
use crate::lock::{LockState, UnlockOutcome};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockResponse {
    pub success: bool,
    pub message: String,
    pub auto_lock_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub success: bool,
    pub door_status: &'static str,
    pub state: LockState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_lock_at: Option<DateTime<Utc>>,
}

pub async fn unlock(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let client = client_address(&req, &state)?;
    let session = state.auth.authorize(bearer_token(&req)?).await?;

    info!("Unlock requested by {} from {}", session.identity, client);
    match state.lock.request_unlock(&session.identity).await {
        Ok(receipt) => {
            let message = match receipt.outcome {
                UnlockOutcome::Actuated => "Door unlocked",
                UnlockOutcome::Extended => "Door already unlocked, auto-lock extended",
            };
            Ok(HttpResponse::Ok().json(UnlockResponse {
                success: true,
                message: message.into(),
                auto_lock_at: receipt.auto_lock_at,
            }))
        }
        Err(e) => {
            if matches!(e, LockError::ActuationFailed(_) | LockError::Fault) {
                error!("Unlock for {} failed: {}", session.identity, e);
            }
            Err(e.into())
        }
    }
}

pub async fn status(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    client_address(&req, &state)?;
    state.auth.authorize(bearer_token(&req)?).await?;

    let status = state.lock.status().await;
    Ok(HttpResponse::Ok().json(StatusResponse {
        success: true,
        door_status: status.door_status,
        state: status.state,
        auto_lock_at: status.auto_lock.map(|t| t.deadline),
    }))
}
