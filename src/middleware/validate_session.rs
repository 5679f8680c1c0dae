use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

use crate::access::{get_permissions, tenant_context, AccessError, Capability, Permissions, Role, Session, TenantScope};
use crate::audit::Actor;
use crate::database::manager::DatabaseManager;
use crate::database::models::Profile;
use crate::error::ApiError;
use crate::services::auth_service;

use super::auth::AuthUser;

/// Validated caller: live profile, store-resolved role and active tenant.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Option<Role>,
    pub home_venue: Option<Uuid>,
    pub permissions: Permissions,
    pub scope: TenantScope,
}

impl RequestContext {
    pub fn require(&self, capability: Capability) -> Result<(), ApiError> {
        if self.permissions.allows(capability) {
            Ok(())
        } else {
            Err(AccessError::Forbidden(capability.describe()).into())
        }
    }

    /// Venue for tenant-scoped operations.
    pub fn venue(&self) -> Result<Uuid, ApiError> {
        self.scope.require_venue().map_err(ApiError::from)
    }

    pub fn actor(&self) -> Actor {
        Actor { user_id: self.user_id, scope: self.scope }
    }
}

/// Middleware that validates the JWT subject against the store:
/// the profile must be active, its role must still match the token, and a
/// tenant-scoped session must point at a venue that is not suspended.
pub async fn validate_session_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    // Get AuthUser from previous JWT middleware
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before session validation"))?;

    let pool = DatabaseManager::main_pool().await?;

    let profile: Option<Profile> = sqlx::query_as(
        r#"
        SELECT id, venue_id, email, full_name, is_active, is_archived, created_at, updated_at
        FROM profiles
        WHERE id = $1
        "#,
    )
    .bind(auth_user.user_id)
    .fetch_optional(&pool)
    .await?;

    let profile = profile.filter(|p| p.is_active && !p.is_archived).ok_or_else(|| {
        tracing::warn!("Session rejected: user {} missing, inactive or archived", auth_user.user_id);
        ApiError::unauthorized("Account is inactive or no longer exists")
    })?;

    let role = auth_service::resolve_role(&pool, profile.id, profile.venue_id).await?;
    if role != auth_user.role {
        tracing::warn!(
            "Session rejected: token role {:?} differs from stored role {:?} for {}",
            auth_user.role,
            role,
            profile.id
        );
        return Err(ApiError::forbidden("Session role is out of date, sign in again"));
    }

    let session = Session {
        user_id: profile.id,
        role,
        home_venue: profile.venue_id,
        impersonating: auth_user.impersonating,
    };
    let scope = tenant_context::resolve(&session)?;

    if let Some(venue_id) = scope.venue_id() {
        let venue: Option<(bool,)> = sqlx::query_as("SELECT suspended FROM venues WHERE id = $1")
            .bind(venue_id)
            .fetch_optional(&pool)
            .await?;
        let (suspended,) = venue.ok_or_else(|| ApiError::not_found("Venue not found"))?;
        tenant_context::check_suspension(role, &scope, suspended)?;
    }

    tracing::debug!("Session validated for {} ({:?}, {:?})", profile.email, role, scope);

    request.extensions_mut().insert(RequestContext {
        user_id: profile.id,
        email: profile.email,
        full_name: profile.full_name,
        role,
        home_venue: profile.venue_id,
        permissions: get_permissions(role),
        scope,
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn context(role: Option<Role>, scope: TenantScope) -> RequestContext {
        RequestContext {
            user_id: Uuid::new_v4(),
            email: "someone@example.com".into(),
            full_name: "Someone".into(),
            role,
            home_venue: scope.venue_id(),
            permissions: get_permissions(role),
            scope,
        }
    }

    #[test]
    fn staff_cannot_manage_menu() {
        let ctx = context(Some(Role::Staff), TenantScope::Tenant { venue_id: Uuid::new_v4(), impersonated: false });
        assert!(ctx.require(Capability::ViewOrders).is_ok());
        let err = ctx.require(Capability::ManageMenu).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert!(err.message().contains("manage the menu"));
    }

    #[test]
    fn platform_scope_has_no_venue() {
        let ctx = context(Some(Role::SuperAdmin), TenantScope::Platform);
        assert_eq!(ctx.venue().unwrap_err().status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ctx.actor().scope, TenantScope::Platform);
    }
}
