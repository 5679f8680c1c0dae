//! Last-admin invariant: a venue with members always keeps at least one
//! active tenant-admin.
//!
//! The check is evaluated at mutation time against a roster that the caller
//! has locked for the venue, so two admins demoting each other concurrently
//! serialize on the venue row instead of both succeeding.

use async_trait::async_trait;
use sqlx::PgConnection;
use thiserror::Error;
use uuid::Uuid;

use super::role::TenantRole;

/// Current standing of a member inside one venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminStanding {
    pub role: TenantRole,
    pub is_active: bool,
}

impl AdminStanding {
    pub fn is_active_admin(&self) -> bool {
        self.is_active && self.role == TenantRole::TenantAdmin
    }
}

/// A proposed change to a member's role or lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    SetRole(TenantRole),
    Activate,
    Deactivate,
    Archive,
    Delete,
}

impl MembershipChange {
    /// Whether an active tenant-admin would lose that status.
    fn revokes_admin(&self) -> bool {
        match self {
            MembershipChange::SetRole(role) => *role != TenantRole::TenantAdmin,
            MembershipChange::Activate => false,
            MembershipChange::Deactivate | MembershipChange::Archive | MembershipChange::Delete => true,
        }
    }
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Cannot remove the last active tenant admin of this venue")]
    LastAdmin,

    #[error("Venue has no active tenant admin; the first member must be a tenant admin")]
    AdminRequired,

    #[error("User is not a member of this venue")]
    NotMember,

    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

/// Pure last-admin check.
pub fn check_last_admin(
    current: &AdminStanding,
    change: &MembershipChange,
    active_admins: i64,
) -> Result<(), GuardError> {
    if current.is_active_admin() && change.revokes_admin() && active_admins <= 1 {
        return Err(GuardError::LastAdmin);
    }
    Ok(())
}

/// New members may be staff only once the venue already has an active admin.
pub fn check_new_member(role: TenantRole, active_admins: i64) -> Result<(), GuardError> {
    if role == TenantRole::Staff && active_admins < 1 {
        return Err(GuardError::AdminRequired);
    }
    Ok(())
}

/// Store access needed by the guard.
#[async_trait]
pub trait AdminRoster: Send {
    /// Serialize concurrent membership changes for a venue.
    async fn lock_venue(&mut self, venue_id: Uuid) -> Result<(), sqlx::Error>;

    async fn standing(&mut self, venue_id: Uuid, user_id: Uuid) -> Result<Option<AdminStanding>, sqlx::Error>;

    async fn active_admin_count(&mut self, venue_id: Uuid) -> Result<i64, sqlx::Error>;
}

#[async_trait]
impl AdminRoster for PgConnection {
    async fn lock_venue(&mut self, venue_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT id FROM venues WHERE id = $1 FOR UPDATE")
            .bind(venue_id)
            .execute(&mut *self)
            .await?;
        Ok(())
    }

    async fn standing(&mut self, venue_id: Uuid, user_id: Uuid) -> Result<Option<AdminStanding>, sqlx::Error> {
        let row: Option<(String, bool, bool)> = sqlx::query_as(
            r#"
            SELECT ur.tenant_role, p.is_active, p.is_archived
            FROM user_roles ur
            JOIN profiles p ON p.id = ur.user_id
            WHERE ur.venue_id = $1 AND ur.user_id = $2
            "#,
        )
        .bind(venue_id)
        .bind(user_id)
        .fetch_optional(&mut *self)
        .await?;

        Ok(row.and_then(|(role, is_active, is_archived)| {
            TenantRole::parse(&role).map(|role| AdminStanding {
                role,
                is_active: is_active && !is_archived,
            })
        }))
    }

    async fn active_admin_count(&mut self, venue_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM user_roles ur
            JOIN profiles p ON p.id = ur.user_id
            WHERE ur.venue_id = $1
              AND ur.tenant_role = 'tenant_admin'
              AND p.is_active
              AND NOT p.is_archived
            "#,
        )
        .bind(venue_id)
        .fetch_one(&mut *self)
        .await?;
        Ok(count)
    }
}

/// Lock the venue, then check the proposed change against the roster.
/// Returns the member's standing before the change.
pub async fn enforce_last_admin<R>(
    roster: &mut R,
    venue_id: Uuid,
    user_id: Uuid,
    change: MembershipChange,
) -> Result<AdminStanding, GuardError>
where
    R: AdminRoster + ?Sized,
{
    roster.lock_venue(venue_id).await?;

    let standing = roster
        .standing(venue_id, user_id)
        .await?
        .ok_or(GuardError::NotMember)?;

    if standing.is_active_admin() && change.revokes_admin() {
        let active = roster.active_admin_count(venue_id).await?;
        check_last_admin(&standing, &change, active)?;
    }

    Ok(standing)
}

/// Lock the venue, then check that a member with `role` may join it.
pub async fn enforce_new_member<R>(roster: &mut R, venue_id: Uuid, role: TenantRole) -> Result<(), GuardError>
where
    R: AdminRoster + ?Sized,
{
    roster.lock_venue(venue_id).await?;
    let active = roster.active_admin_count(venue_id).await?;
    check_new_member(role, active)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryRoster {
        members: HashMap<(Uuid, Uuid), AdminStanding>,
        locks: usize,
    }

    impl MemoryRoster {
        fn add(&mut self, venue: Uuid, role: TenantRole, is_active: bool) -> Uuid {
            let user = Uuid::new_v4();
            self.members.insert((venue, user), AdminStanding { role, is_active });
            user
        }
    }

    #[async_trait]
    impl AdminRoster for MemoryRoster {
        async fn lock_venue(&mut self, _venue_id: Uuid) -> Result<(), sqlx::Error> {
            self.locks += 1;
            Ok(())
        }

        async fn standing(&mut self, venue_id: Uuid, user_id: Uuid) -> Result<Option<AdminStanding>, sqlx::Error> {
            Ok(self.members.get(&(venue_id, user_id)).copied())
        }

        async fn active_admin_count(&mut self, venue_id: Uuid) -> Result<i64, sqlx::Error> {
            Ok(self
                .members
                .iter()
                .filter(|((v, _), s)| *v == venue_id && s.is_active_admin())
                .count() as i64)
        }
    }

    const ADMIN: AdminStanding = AdminStanding { role: TenantRole::TenantAdmin, is_active: true };

    #[test]
    fn sole_admin_cannot_lose_admin_status() {
        for change in [
            MembershipChange::Deactivate,
            MembershipChange::Archive,
            MembershipChange::Delete,
            MembershipChange::SetRole(TenantRole::Staff),
        ] {
            assert!(matches!(check_last_admin(&ADMIN, &change, 1), Err(GuardError::LastAdmin)));
        }
    }

    #[test]
    fn harmless_changes_pass_for_sole_admin() {
        assert!(check_last_admin(&ADMIN, &MembershipChange::Activate, 1).is_ok());
        assert!(check_last_admin(&ADMIN, &MembershipChange::SetRole(TenantRole::TenantAdmin), 1).is_ok());
    }

    #[test]
    fn non_sole_admin_may_be_removed() {
        assert!(check_last_admin(&ADMIN, &MembershipChange::Deactivate, 2).is_ok());
    }

    #[test]
    fn staff_and_inactive_admins_are_not_guarded() {
        let staff = AdminStanding { role: TenantRole::Staff, is_active: true };
        let inactive = AdminStanding { role: TenantRole::TenantAdmin, is_active: false };
        assert!(check_last_admin(&staff, &MembershipChange::Delete, 0).is_ok());
        assert!(check_last_admin(&inactive, &MembershipChange::Delete, 0).is_ok());
    }

    #[test]
    fn first_member_must_be_admin() {
        assert!(matches!(check_new_member(TenantRole::Staff, 0), Err(GuardError::AdminRequired)));
        assert!(check_new_member(TenantRole::TenantAdmin, 0).is_ok());
        assert!(check_new_member(TenantRole::Staff, 1).is_ok());
    }

    #[tokio::test]
    async fn deactivating_sole_admin_fails() {
        let venue = Uuid::new_v4();
        let mut roster = MemoryRoster::default();
        let admin = roster.add(venue, TenantRole::TenantAdmin, true);
        roster.add(venue, TenantRole::Staff, true);

        let err = enforce_last_admin(&mut roster, venue, admin, MembershipChange::Deactivate)
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::LastAdmin));
        assert_eq!(roster.locks, 1);
    }

    #[tokio::test]
    async fn deactivating_one_of_two_admins_succeeds() {
        let venue = Uuid::new_v4();
        let mut roster = MemoryRoster::default();
        let first = roster.add(venue, TenantRole::TenantAdmin, true);
        roster.add(venue, TenantRole::TenantAdmin, true);

        let standing = enforce_last_admin(&mut roster, venue, first, MembershipChange::Deactivate)
            .await
            .unwrap();
        assert!(standing.is_active_admin());
    }

    #[tokio::test]
    async fn admins_of_other_venues_do_not_count() {
        let venue = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut roster = MemoryRoster::default();
        let admin = roster.add(venue, TenantRole::TenantAdmin, true);
        roster.add(other, TenantRole::TenantAdmin, true);

        let result = enforce_last_admin(&mut roster, venue, admin, MembershipChange::SetRole(TenantRole::Staff)).await;
        assert!(matches!(result, Err(GuardError::LastAdmin)));
    }

    #[tokio::test]
    async fn unknown_member_is_rejected() {
        let mut roster = MemoryRoster::default();
        let result = enforce_last_admin(&mut roster, Uuid::new_v4(), Uuid::new_v4(), MembershipChange::Delete).await;
        assert!(matches!(result, Err(GuardError::NotMember)));
    }

    #[tokio::test]
    async fn staff_cannot_join_adminless_venue() {
        let venue = Uuid::new_v4();
        let mut roster = MemoryRoster::default();
        roster.add(venue, TenantRole::TenantAdmin, false);

        let result = enforce_new_member(&mut roster, venue, TenantRole::Staff).await;
        assert!(matches!(result, Err(GuardError::AdminRequired)));
        assert!(enforce_new_member(&mut roster, venue, TenantRole::TenantAdmin).await.is_ok());
    }
}
