use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::access::{enforce_last_admin, enforce_new_member, MembershipChange, TenantRole};
use crate::audit::{self, Actor, AuditAction, AuditEvent, TargetType};
use crate::auth::{password, tokens};
use crate::config;
use crate::database::manager::DatabaseManager;
use crate::database::models::Member;

use super::validation::{normalize_email, required_text, MAX_NAME_LEN};
use super::{ServiceError, ServiceResult};

const MEMBER_COLUMNS: &str = r#"
    p.id, ur.venue_id, p.email, p.full_name, p.is_active, p.is_archived, ur.tenant_role, p.created_at
"#;

#[derive(Debug, Deserialize)]
pub struct CreateMember {
    pub email: String,
    pub full_name: String,
    pub role: TenantRole,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMember {
    pub full_name: Option<String>,
    pub role: Option<TenantRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvitation {
    pub email: String,
    pub role: TenantRole,
}

#[derive(Debug, Serialize)]
pub struct InvitationIssued {
    pub id: Uuid,
    pub email: String,
    pub role: TenantRole,
    pub expires_at: DateTime<Utc>,
    /// Only returned where email delivery is stubbed out (development).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Create a profile, its credential and its venue role on `conn`.
/// Callers run the new-member guard first.
pub async fn insert_member(
    conn: &mut PgConnection,
    venue_id: Uuid,
    email: &str,
    full_name: &str,
    role: TenantRole,
    password_hash: &str,
) -> ServiceResult<Member> {
    let user_id = Uuid::new_v4();

    let inserted = sqlx::query("INSERT INTO profiles (id, venue_id, email, full_name) VALUES ($1, $2, $3, $4)")
        .bind(user_id)
        .bind(venue_id)
        .bind(email)
        .bind(full_name)
        .execute(&mut *conn)
        .await;
    if let Err(sqlx::Error::Database(db)) = &inserted {
        if db.is_unique_violation() {
            return Err(ServiceError::Conflict(format!("A user with email {} already exists", email)));
        }
    }
    inserted?;

    sqlx::query("INSERT INTO credentials (user_id, password_hash) VALUES ($1, $2)")
        .bind(user_id)
        .bind(password_hash)
        .execute(&mut *conn)
        .await?;

    sqlx::query("INSERT INTO user_roles (user_id, venue_id, tenant_role) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(venue_id)
        .bind(role.as_str())
        .execute(&mut *conn)
        .await?;

    fetch_member(conn, venue_id, user_id).await?.ok_or(ServiceError::NotFound("User"))
}

async fn fetch_member(conn: &mut PgConnection, venue_id: Uuid, user_id: Uuid) -> ServiceResult<Option<Member>> {
    let sql = format!(
        "SELECT {} FROM profiles p JOIN user_roles ur ON ur.user_id = p.id WHERE ur.venue_id = $1 AND p.id = $2",
        MEMBER_COLUMNS
    );
    Ok(sqlx::query_as::<_, Member>(&sql)
        .bind(venue_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?)
}

pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub async fn new() -> ServiceResult<Self> {
        let pool = DatabaseManager::main_pool().await?;
        Ok(Self { pool })
    }

    pub async fn list_members(&self, venue_id: Uuid) -> ServiceResult<Vec<Member>> {
        let sql = format!(
            "SELECT {} FROM profiles p JOIN user_roles ur ON ur.user_id = p.id WHERE ur.venue_id = $1 ORDER BY p.created_at",
            MEMBER_COLUMNS
        );
        Ok(sqlx::query_as::<_, Member>(&sql).bind(venue_id).fetch_all(&self.pool).await?)
    }

    pub async fn create_member(&self, actor: &Actor, venue_id: Uuid, input: CreateMember) -> ServiceResult<Member> {
        let email = normalize_email(&input.email)?;
        let full_name = required_text("Full name", &input.full_name, MAX_NAME_LEN)?;
        let password_hash = password::hash_password(&input.password)?;

        let mut tx = self.pool.begin().await?;
        enforce_new_member(&mut *tx, venue_id, input.role).await?;
        let member = insert_member(&mut tx, venue_id, &email, &full_name, input.role, &password_hash).await?;

        let event = AuditEvent::new(actor, AuditAction::CreateUser, TargetType::User)
            .target(member.id)
            .details(json!({ "email": member.email, "role": input.role }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;

        tracing::info!("Created {} {} in venue {}", input.role, member.email, venue_id);
        Ok(member)
    }

    /// Apply name, role and activation changes. Role and activation changes
    /// pass through the last-admin guard under the venue lock.
    pub async fn update_member(
        &self,
        actor: &Actor,
        venue_id: Uuid,
        user_id: Uuid,
        input: UpdateMember,
    ) -> ServiceResult<Member> {
        let full_name = input
            .full_name
            .as_deref()
            .map(|name| required_text("Full name", name, MAX_NAME_LEN))
            .transpose()?;

        let mut tx = self.pool.begin().await?;

        let mut changes = Vec::new();
        if let Some(role) = input.role {
            changes.push(MembershipChange::SetRole(role));
        }
        match input.is_active {
            Some(true) => changes.push(MembershipChange::Activate),
            Some(false) => changes.push(MembershipChange::Deactivate),
            None => {}
        }
        for change in &changes {
            enforce_last_admin(&mut *tx, venue_id, user_id, *change).await?;
        }
        if changes.is_empty() {
            // Still confirm membership before touching the profile.
            fetch_member(&mut tx, venue_id, user_id).await?.ok_or(ServiceError::NotFound("User"))?;
        }

        if let Some(role) = input.role {
            sqlx::query("UPDATE user_roles SET tenant_role = $3 WHERE venue_id = $1 AND user_id = $2")
                .bind(venue_id)
                .bind(user_id)
                .bind(role.as_str())
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            UPDATE profiles
            SET full_name = COALESCE($2, full_name),
                is_active = COALESCE($3, is_active),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(&full_name)
        .bind(input.is_active)
        .execute(&mut *tx)
        .await?;

        let member = fetch_member(&mut tx, venue_id, user_id).await?.ok_or(ServiceError::NotFound("User"))?;

        let event = AuditEvent::new(actor, AuditAction::UpdateUser, TargetType::User)
            .target(user_id)
            .details(json!({
                "full_name": full_name,
                "role": input.role,
                "is_active": input.is_active,
            }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;

        Ok(member)
    }

    pub async fn archive_member(&self, actor: &Actor, venue_id: Uuid, user_id: Uuid) -> ServiceResult<Member> {
        let mut tx = self.pool.begin().await?;
        enforce_last_admin(&mut *tx, venue_id, user_id, MembershipChange::Archive).await?;

        sqlx::query("UPDATE profiles SET is_archived = TRUE, is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let member = fetch_member(&mut tx, venue_id, user_id).await?.ok_or(ServiceError::NotFound("User"))?;

        let event = AuditEvent::new(actor, AuditAction::ArchiveUser, TargetType::User).target(user_id);
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;

        Ok(member)
    }

    /// Delete the profile; roles and credentials cascade.
    pub async fn delete_member(&self, actor: &Actor, venue_id: Uuid, user_id: Uuid) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;
        let standing = enforce_last_admin(&mut *tx, venue_id, user_id, MembershipChange::Delete).await?;

        let email: Option<(String,)> = sqlx::query_as("DELETE FROM profiles WHERE id = $1 RETURNING email")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let (email,) = email.ok_or(ServiceError::NotFound("User"))?;

        let event = AuditEvent::new(actor, AuditAction::DeleteUser, TargetType::User)
            .target(user_id)
            .details(json!({ "email": email, "role": standing.role }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;

        tracing::info!("Deleted user {} from venue {}", email, venue_id);
        Ok(())
    }

    pub async fn set_password(&self, actor: &Actor, venue_id: Uuid, user_id: Uuid, new_password: &str) -> ServiceResult<()> {
        let password_hash = password::hash_password(new_password)?;

        let mut tx = self.pool.begin().await?;
        fetch_member(&mut tx, venue_id, user_id).await?.ok_or(ServiceError::NotFound("User"))?;
        upsert_credential(&mut tx, user_id, &password_hash).await?;

        let event = AuditEvent::new(actor, AuditAction::SetPassword, TargetType::User).target(user_id);
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn invite(&self, actor: &Actor, venue_id: Uuid, input: CreateInvitation) -> ServiceResult<InvitationIssued> {
        let email = normalize_email(&input.email)?;
        let security = &config::config().security;

        let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM profiles WHERE email = $1")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!("A user with email {} already exists", email)));
        }

        let token = tokens::random_token(40);
        let id = Uuid::new_v4();
        let expires_at = Utc::now() + Duration::hours(security.invitation_ttl_hours);

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO invitations (id, venue_id, email, tenant_role, token_hash, invited_by, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(venue_id)
        .bind(&email)
        .bind(input.role.as_str())
        .bind(tokens::hash_token(&token))
        .bind(actor.user_id)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        let event = AuditEvent::new(actor, AuditAction::InviteUser, TargetType::Invitation)
            .target(id)
            .details(json!({ "email": email, "role": input.role }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;

        tracing::info!("Invitation {} issued for {} ({})", id, email, input.role);
        if security.expose_dev_tokens {
            tracing::debug!("Invitation token for {}: {}", email, token);
        }

        Ok(InvitationIssued {
            id,
            email,
            role: input.role,
            expires_at,
            token: security.expose_dev_tokens.then_some(token),
        })
    }
}

pub async fn upsert_credential(conn: &mut PgConnection, user_id: Uuid, password_hash: &str) -> ServiceResult<()> {
    sqlx::query(
        r#"
        INSERT INTO credentials (user_id, password_hash, updated_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (user_id) DO UPDATE SET password_hash = EXCLUDED.password_hash, updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(password_hash)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
