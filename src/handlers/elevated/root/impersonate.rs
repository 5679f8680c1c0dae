use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::access::Capability;
use crate::middleware::{ApiResponse, ApiResult, RequestContext};
use crate::services::auth_service::{AuthService, SessionToken};

#[derive(Debug, Deserialize)]
pub struct ImpersonateRequest {
    pub venue_id: Uuid,
}

/// POST /api/root/impersonate - Token acting inside one venue
///
/// Expected Input:
/// ```json
/// { "venue_id": "uuid" }
/// ```
///
/// The returned token expires after the impersonation TTL. Audit events
/// written with it carry `impersonating: true`.
pub async fn impersonate_start(
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<ImpersonateRequest>,
) -> ApiResult<SessionToken> {
    ctx.require(Capability::Impersonate)?;
    let service = AuthService::new().await?;
    Ok(ApiResponse::success(service.start_impersonation(&ctx.actor(), payload.venue_id).await?))
}

/// DELETE /api/root/impersonate - Back to a platform-scoped token
pub async fn impersonate_stop(Extension(ctx): Extension<RequestContext>) -> ApiResult<SessionToken> {
    ctx.require(Capability::Impersonate)?;
    let service = AuthService::new().await?;
    Ok(ApiResponse::success(service.stop_impersonation(&ctx.actor()).await?))
}
