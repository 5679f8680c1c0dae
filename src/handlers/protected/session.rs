use axum::Extension;
use serde::Serialize;
use uuid::Uuid;

use crate::access::{Permissions, Role, TenantScope};
use crate::middleware::{ApiResponse, ApiResult, RequestContext};

#[derive(Debug, Serialize)]
pub struct WhoAmI {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub venue_id: Option<Uuid>,
    pub role: Option<Role>,
    pub permissions: Permissions,
    pub scope: TenantScope,
}

/// GET /api/auth/whoami - Current user as validated against the store
///
/// Expected Output:
/// ```json
/// {
///   "success": true,
///   "data": {
///     "id": "uuid",
///     "email": "owner@cafe.test",
///     "full_name": "Ada Owner",
///     "venue_id": "uuid",
///     "role": "tenant_admin",
///     "permissions": { "canManageUsers": true, "...": "..." },
///     "scope": { "scope": "tenant", "venue_id": "uuid", "impersonated": false }
///   }
/// }
/// ```
pub async fn whoami(Extension(ctx): Extension<RequestContext>) -> ApiResult<WhoAmI> {
    Ok(ApiResponse::success(WhoAmI {
        id: ctx.user_id,
        email: ctx.email,
        full_name: ctx.full_name,
        venue_id: ctx.home_venue,
        role: ctx.role,
        permissions: ctx.permissions,
        scope: ctx.scope,
    }))
}
