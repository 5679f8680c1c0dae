// handlers/protected/users.rs - Venue membership management
//
// Every endpoint needs `can_manage_users`. Role changes, deactivation,
// archival and deletion pass through the last-admin guard in the service.

use axum::{extract::Path, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::access::Capability;
use crate::database::models::Member;
use crate::middleware::{ApiResponse, ApiResult, RequestContext};
use crate::services::user_service::{CreateInvitation, CreateMember, InvitationIssued, UpdateMember, UserService};

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub password: String,
}

/// GET /api/users - Members of the active venue
pub async fn user_list(Extension(ctx): Extension<RequestContext>) -> ApiResult<Vec<Member>> {
    ctx.require(Capability::ManageUsers)?;
    let venue_id = ctx.venue()?;
    let service = UserService::new().await?;
    Ok(ApiResponse::success(service.list_members(venue_id).await?))
}

/// POST /api/users - Create a member with an initial password
///
/// Expected Input:
/// ```json
/// {
///   "email": "barista@cafe.test",
///   "full_name": "Bo Barista",
///   "role": "staff",          // or "tenant_admin"
///   "password": "..."
/// }
/// ```
///
/// A venue with no active admin only accepts a tenant_admin (422 ADMIN_REQUIRED).
pub async fn user_create(Extension(ctx): Extension<RequestContext>, Json(payload): Json<CreateMember>) -> ApiResult<Member> {
    ctx.require(Capability::ManageUsers)?;
    let venue_id = ctx.venue()?;
    let service = UserService::new().await?;
    Ok(ApiResponse::created(service.create_member(&ctx.actor(), venue_id, payload).await?))
}

/// PATCH /api/users/:id
///
/// Expected Input (all optional):
/// ```json
/// { "full_name": "...", "role": "staff", "is_active": false }
/// ```
pub async fn user_update(
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMember>,
) -> ApiResult<Member> {
    ctx.require(Capability::ManageUsers)?;
    let venue_id = ctx.venue()?;
    let service = UserService::new().await?;
    Ok(ApiResponse::success(service.update_member(&ctx.actor(), venue_id, id, payload).await?))
}

/// POST /api/users/:id/archive
pub async fn user_archive(Extension(ctx): Extension<RequestContext>, Path(id): Path<Uuid>) -> ApiResult<Member> {
    ctx.require(Capability::ManageUsers)?;
    let venue_id = ctx.venue()?;
    let service = UserService::new().await?;
    Ok(ApiResponse::success(service.archive_member(&ctx.actor(), venue_id, id).await?))
}

/// DELETE /api/users/:id
pub async fn user_delete(Extension(ctx): Extension<RequestContext>, Path(id): Path<Uuid>) -> ApiResult<Value> {
    ctx.require(Capability::ManageUsers)?;
    let venue_id = ctx.venue()?;
    let service = UserService::new().await?;
    service.delete_member(&ctx.actor(), venue_id, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

/// POST /api/users/:id/password - Admin-set password
pub async fn user_password(
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PasswordRequest>,
) -> ApiResult<Value> {
    ctx.require(Capability::ManageUsers)?;
    let venue_id = ctx.venue()?;
    let service = UserService::new().await?;
    service.set_password(&ctx.actor(), venue_id, id, &payload.password).await?;
    Ok(ApiResponse::success(json!({ "id": id, "password_set": true })))
}

/// POST /api/invitations
///
/// Expected Input:
/// ```json
/// { "email": "new@cafe.test", "role": "staff" }
/// ```
pub async fn invitation_create(
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<CreateInvitation>,
) -> ApiResult<InvitationIssued> {
    ctx.require(Capability::ManageUsers)?;
    let venue_id = ctx.venue()?;
    let service = UserService::new().await?;
    Ok(ApiResponse::created(service.invite(&ctx.actor(), venue_id, payload).await?))
}
