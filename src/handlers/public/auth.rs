// handlers/public/auth.rs - Token acquisition and credential recovery

use axum::Json;
use serde::{Deserialize, Serialize};

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::auth_service::{AuthService, SessionToken};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetConfirm {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct InvitationAccept {
    pub token: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct ResetRequested {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

/// POST /auth/login - Exchange email and password for a session JWT
///
/// Expected Input:
/// ```json
/// { "email": "owner@cafe.test", "password": "correct horse battery" }
/// ```
///
/// Returns the token, the profile, the store-resolved role and its
/// permission set. Unknown users and wrong passwords both give 401.
pub async fn login(Json(payload): Json<LoginRequest>) -> ApiResult<SessionToken> {
    let service = AuthService::new().await?;
    let session = service.login(&payload.email, &payload.password).await?;
    Ok(ApiResponse::success(session))
}

/// POST /auth/password-reset/request - Start a password reset
///
/// Always answers the same way whether or not the email exists. Rate
/// limited per email address.
pub async fn password_reset_request(Json(payload): Json<ResetRequest>) -> ApiResult<ResetRequested> {
    let service = AuthService::new().await?;
    let reset_token = service.request_password_reset(&payload.email).await?;
    Ok(ApiResponse::success(ResetRequested {
        message: "If the account exists, a reset link has been sent",
        reset_token,
    }))
}

/// POST /auth/password-reset/confirm - Set a new password with a reset token
///
/// Expected Input:
/// ```json
/// { "token": "...", "new_password": "..." }
/// ```
pub async fn password_reset_confirm(Json(payload): Json<ResetConfirm>) -> ApiResult<serde_json::Value> {
    let service = AuthService::new().await?;
    service.confirm_password_reset(&payload.token, &payload.new_password).await?;
    Ok(ApiResponse::success(serde_json::json!({ "password_reset": true })))
}

/// POST /auth/invitations/accept - Join a venue from an invitation token
pub async fn invitation_accept(Json(payload): Json<InvitationAccept>) -> ApiResult<SessionToken> {
    let service = AuthService::new().await?;
    let session = service
        .accept_invitation(&payload.token, &payload.full_name, &payload.password)
        .await?;
    Ok(ApiResponse::created(session))
}
