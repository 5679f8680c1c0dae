//! Append-only record of privileged mutations.
//!
//! Events are written on the same connection (usually the same transaction)
//! as the mutation they describe. The table rejects UPDATE and DELETE.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::access::TenantScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // Tenants
    CreateVenue,
    UpdateVenue,
    SuspendVenue,
    ReinstateVenue,
    SetFeatureFlag,
    StartImpersonation,
    StopImpersonation,
    // Users
    CreateUser,
    UpdateUser,
    ArchiveUser,
    DeleteUser,
    SetPassword,
    InviteUser,
    AcceptInvitation,
    // Venue content
    CreateCategory,
    UpdateCategory,
    DeleteCategory,
    CreateMenuItem,
    UpdateMenuItem,
    DeleteMenuItem,
    CreateTable,
    UpdateTable,
    DeleteTable,
    RotateTableQr,
    UpdateBankDetails,
    IssueSignedUrl,
    // Orders
    UpdateOrderStatus,
    ConfirmPayment,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateVenue => "create_venue",
            AuditAction::UpdateVenue => "update_venue",
            AuditAction::SuspendVenue => "suspend_venue",
            AuditAction::ReinstateVenue => "reinstate_venue",
            AuditAction::SetFeatureFlag => "set_feature_flag",
            AuditAction::StartImpersonation => "start_impersonation",
            AuditAction::StopImpersonation => "stop_impersonation",
            AuditAction::CreateUser => "create_user",
            AuditAction::UpdateUser => "update_user",
            AuditAction::ArchiveUser => "archive_user",
            AuditAction::DeleteUser => "delete_user",
            AuditAction::SetPassword => "set_password",
            AuditAction::InviteUser => "invite_user",
            AuditAction::AcceptInvitation => "accept_invitation",
            AuditAction::CreateCategory => "create_category",
            AuditAction::UpdateCategory => "update_category",
            AuditAction::DeleteCategory => "delete_category",
            AuditAction::CreateMenuItem => "create_menu_item",
            AuditAction::UpdateMenuItem => "update_menu_item",
            AuditAction::DeleteMenuItem => "delete_menu_item",
            AuditAction::CreateTable => "create_table",
            AuditAction::UpdateTable => "update_table",
            AuditAction::DeleteTable => "delete_table",
            AuditAction::RotateTableQr => "rotate_table_qr",
            AuditAction::UpdateBankDetails => "update_bank_details",
            AuditAction::IssueSignedUrl => "issue_signed_url",
            AuditAction::UpdateOrderStatus => "update_order_status",
            AuditAction::ConfirmPayment => "confirm_payment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Venue,
    User,
    Invitation,
    Category,
    MenuItem,
    Table,
    Order,
    BankDetails,
    FeatureFlag,
    StorageObject,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Venue => "venue",
            TargetType::User => "user",
            TargetType::Invitation => "invitation",
            TargetType::Category => "category",
            TargetType::MenuItem => "menu_item",
            TargetType::Table => "table",
            TargetType::Order => "order",
            TargetType::BankDetails => "bank_details",
            TargetType::FeatureFlag => "feature_flag",
            TargetType::StorageObject => "storage_object",
        }
    }
}

/// Who performed a privileged mutation, and in which tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub scope: TenantScope,
}

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub actor_id: Uuid,
    pub venue_id: Option<Uuid>,
    pub impersonating: bool,
    pub action: AuditAction,
    pub target_type: TargetType,
    pub target_id: Option<String>,
    pub details: Value,
}

impl AuditEvent {
    pub fn new(actor: &Actor, action: AuditAction, target_type: TargetType) -> Self {
        Self {
            actor_id: actor.user_id,
            venue_id: actor.scope.venue_id(),
            impersonating: actor.scope.is_impersonated(),
            action,
            target_type,
            target_id: None,
            details: json!({}),
        }
    }

    pub fn target(mut self, id: impl ToString) -> Self {
        self.target_id = Some(id.to_string());
        self
    }

    /// Platform events (venue creation, flags) name the venue they touch.
    pub fn in_venue(mut self, venue_id: Uuid) -> Self {
        self.venue_id = Some(venue_id);
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub venue_id: Option<Uuid>,
    pub impersonating: bool,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<String>,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

/// Append an event. Use the mutation's transaction so both commit together.
pub async fn record(conn: &mut PgConnection, event: &AuditEvent) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO audit_events
            (id, actor_id, venue_id, impersonating, action, target_type, target_id, details, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
        "#,
    )
    .bind(id)
    .bind(event.actor_id)
    .bind(event.venue_id)
    .bind(event.impersonating)
    .bind(event.action.as_str())
    .bind(event.target_type.as_str())
    .bind(&event.target_id)
    .bind(&event.details)
    .execute(&mut *conn)
    .await?;

    if crate::config::config().security.enable_audit_logging {
        tracing::info!(
            target: "audit",
            actor = %event.actor_id,
            venue = ?event.venue_id,
            impersonating = event.impersonating,
            action = event.action.as_str(),
            target_type = event.target_type.as_str(),
            target_id = ?event.target_id,
            "privileged mutation"
        );
    }

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_captures_impersonation_scope() {
        let venue = Uuid::new_v4();
        let actor = Actor {
            user_id: Uuid::new_v4(),
            scope: TenantScope::Tenant { venue_id: venue, impersonated: true },
        };
        let event = AuditEvent::new(&actor, AuditAction::DeleteMenuItem, TargetType::MenuItem).target(42);

        assert_eq!(event.venue_id, Some(venue));
        assert!(event.impersonating);
        assert_eq!(event.target_id.as_deref(), Some("42"));
        assert_eq!(event.details, json!({}));
    }

    #[test]
    fn platform_events_can_name_a_venue() {
        let venue = Uuid::new_v4();
        let actor = Actor { user_id: Uuid::new_v4(), scope: TenantScope::Platform };
        let event = AuditEvent::new(&actor, AuditAction::SuspendVenue, TargetType::Venue).in_venue(venue);
        assert_eq!(event.venue_id, Some(venue));
        assert!(!event.impersonating);
    }

    #[test]
    fn action_strings_match_serde_names() {
        for action in [AuditAction::StartImpersonation, AuditAction::UpdateOrderStatus, AuditAction::SetPassword] {
            assert_eq!(serde_json::to_value(action).unwrap(), action.as_str());
        }
        assert_eq!(serde_json::to_value(TargetType::MenuItem).unwrap(), TargetType::MenuItem.as_str());
    }
}
