use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::role::Role;

/// Identity and impersonation state of a validated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub role: Option<Role>,
    pub home_venue: Option<Uuid>,
    pub impersonating: Option<Uuid>,
}

/// Which tenant (if any) the session currently acts within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum TenantScope {
    Platform,
    Tenant { venue_id: Uuid, impersonated: bool },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Only super-admins can impersonate a venue")]
    ImpersonationNotAllowed,

    #[error("User is not attached to a venue")]
    MissingVenue,

    #[error("No active venue; impersonate a venue first")]
    NoActiveTenant,

    #[error("Venue is suspended")]
    VenueSuspended,

    #[error("Not allowed to {0}")]
    Forbidden(&'static str),
}

impl TenantScope {
    pub fn venue_id(&self) -> Option<Uuid> {
        match self {
            TenantScope::Platform => None,
            TenantScope::Tenant { venue_id, .. } => Some(*venue_id),
        }
    }

    pub fn is_impersonated(&self) -> bool {
        matches!(self, TenantScope::Tenant { impersonated: true, .. })
    }

    /// Venue id for tenant-scoped operations.
    pub fn require_venue(&self) -> Result<Uuid, AccessError> {
        self.venue_id().ok_or(AccessError::NoActiveTenant)
    }
}

/// Determine the active tenant from session and impersonation state.
pub fn resolve(session: &Session) -> Result<TenantScope, AccessError> {
    match session.role {
        Some(Role::SuperAdmin) => Ok(match session.impersonating {
            Some(venue_id) => TenantScope::Tenant { venue_id, impersonated: true },
            None => TenantScope::Platform,
        }),
        _ if session.impersonating.is_some() => Err(AccessError::ImpersonationNotAllowed),
        Some(Role::TenantAdmin) | Some(Role::Staff) => session
            .home_venue
            .map(|venue_id| TenantScope::Tenant { venue_id, impersonated: false })
            .ok_or(AccessError::MissingVenue),
        // A profile without a role still belongs to its venue; it simply has no capabilities.
        None => Ok(session
            .home_venue
            .map(|venue_id| TenantScope::Tenant { venue_id, impersonated: false })
            .unwrap_or(TenantScope::Platform)),
    }
}

/// Suspension only binds tenant users; super-admins keep access to repair a venue.
pub fn check_suspension(role: Option<Role>, scope: &TenantScope, suspended: bool) -> Result<(), AccessError> {
    if suspended && scope.venue_id().is_some() && role != Some(Role::SuperAdmin) {
        return Err(AccessError::VenueSuspended);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: Option<Role>, home: Option<Uuid>, impersonating: Option<Uuid>) -> Session {
        Session { user_id: Uuid::new_v4(), role, home_venue: home, impersonating }
    }

    #[test]
    fn super_admin_without_impersonation_is_platform_scoped() {
        let scope = resolve(&session(Some(Role::SuperAdmin), None, None)).unwrap();
        assert_eq!(scope, TenantScope::Platform);
        assert_eq!(scope.require_venue(), Err(AccessError::NoActiveTenant));
    }

    #[test]
    fn super_admin_impersonation_selects_venue() {
        let venue = Uuid::new_v4();
        let scope = resolve(&session(Some(Role::SuperAdmin), None, Some(venue))).unwrap();
        assert_eq!(scope, TenantScope::Tenant { venue_id: venue, impersonated: true });
        assert!(scope.is_impersonated());
    }

    #[test]
    fn tenant_users_use_home_venue() {
        let venue = Uuid::new_v4();
        for role in [Role::TenantAdmin, Role::Staff] {
            let scope = resolve(&session(Some(role), Some(venue), None)).unwrap();
            assert_eq!(scope.require_venue(), Ok(venue));
            assert!(!scope.is_impersonated());
        }
    }

    #[test]
    fn tenant_users_cannot_impersonate() {
        let home = Uuid::new_v4();
        let other = Uuid::new_v4();
        let err = resolve(&session(Some(Role::TenantAdmin), Some(home), Some(other))).unwrap_err();
        assert_eq!(err, AccessError::ImpersonationNotAllowed);
        let err = resolve(&session(None, Some(home), Some(other))).unwrap_err();
        assert_eq!(err, AccessError::ImpersonationNotAllowed);
    }

    #[test]
    fn tenant_role_without_venue_is_rejected() {
        let err = resolve(&session(Some(Role::Staff), None, None)).unwrap_err();
        assert_eq!(err, AccessError::MissingVenue);
    }

    #[test]
    fn suspended_venue_blocks_tenant_users_only() {
        let scope = TenantScope::Tenant { venue_id: Uuid::new_v4(), impersonated: false };
        assert_eq!(check_suspension(Some(Role::Staff), &scope, true), Err(AccessError::VenueSuspended));
        assert_eq!(check_suspension(Some(Role::TenantAdmin), &scope, true), Err(AccessError::VenueSuspended));
        assert!(check_suspension(Some(Role::SuperAdmin), &scope, true).is_ok());
        assert!(check_suspension(Some(Role::Staff), &scope, false).is_ok());
        assert!(check_suspension(Some(Role::Staff), &TenantScope::Platform, true).is_ok());
    }
}
