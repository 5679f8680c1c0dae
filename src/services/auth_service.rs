use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::access::{enforce_new_member, get_permissions, AccessError, Permissions, Role, TenantRole, TenantScope};
use crate::audit::{self, Actor, AuditAction, AuditEvent, TargetType};
use crate::auth::{self, password, tokens, Claims};
use crate::config;
use crate::database::manager::DatabaseManager;
use crate::database::models::{Profile, Venue};

use super::rate_limit::{self, RateScope};
use super::user_service::{insert_member, upsert_credential};
use super::validation::{normalize_email, required_text, MAX_NAME_LEN};
use super::{ServiceError, ServiceResult};

const INVALID_RESET: &str = "Reset link is invalid or has expired";
const INVALIDATE_RESETS: &str = "UPDATE password_resets SET used_at = NOW() WHERE user_id = $1 AND used_at IS NULL";
const PROFILE_COLUMNS: &str = "id, venue_id, email, full_name, is_active, is_archived, created_at, updated_at";

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub venue_id: Option<Uuid>,
}

/// Issued session token plus what the dashboard needs to render.
#[derive(Debug, Serialize)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: i64,
    pub user: SessionUser,
    pub role: Option<Role>,
    pub permissions: Permissions,
    pub impersonating: Option<Uuid>,
}

impl SessionToken {
    fn issue(profile: &Profile, role: Option<Role>, claims: Claims) -> ServiceResult<Self> {
        let token = auth::generate_jwt(&claims)?;
        Ok(Self {
            token,
            expires_at: claims.exp,
            user: SessionUser {
                id: profile.id,
                email: profile.email.clone(),
                full_name: profile.full_name.clone(),
                venue_id: profile.venue_id,
            },
            role,
            permissions: get_permissions(role),
            impersonating: claims.impersonating,
        })
    }
}

/// Role from the store: super-admin table first, then the home venue's role.
pub async fn resolve_role(pool: &PgPool, user_id: Uuid, home_venue: Option<Uuid>) -> Result<Option<Role>, sqlx::Error> {
    let mut conn = pool.acquire().await?;
    resolve_role_on(&mut conn, user_id, home_venue).await
}

async fn resolve_role_on(conn: &mut PgConnection, user_id: Uuid, home_venue: Option<Uuid>) -> Result<Option<Role>, sqlx::Error> {
    let super_admin: Option<(Uuid,)> = sqlx::query_as("SELECT user_id FROM super_admins WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    if super_admin.is_some() {
        return Ok(Some(Role::SuperAdmin));
    }

    let Some(venue_id) = home_venue else {
        return Ok(None);
    };
    let role: Option<(String,)> = sqlx::query_as("SELECT tenant_role FROM user_roles WHERE user_id = $1 AND venue_id = $2")
        .bind(user_id)
        .bind(venue_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(role.and_then(|(role,)| Role::parse(Some(role.as_str()))))
}

pub struct AuthService {
    pool: PgPool,
}

impl AuthService {
    pub async fn new() -> ServiceResult<Self> {
        let pool = DatabaseManager::main_pool().await?;
        Ok(Self { pool })
    }

    async fn profile_by_email(&self, email: &str) -> ServiceResult<Option<Profile>> {
        let sql = format!("SELECT {} FROM profiles WHERE email = $1", PROFILE_COLUMNS);
        Ok(sqlx::query_as::<_, Profile>(&sql).bind(email).fetch_optional(&self.pool).await?)
    }

    async fn profile_by_id(&self, user_id: Uuid) -> ServiceResult<Profile> {
        let sql = format!("SELECT {} FROM profiles WHERE id = $1", PROFILE_COLUMNS);
        sqlx::query_as::<_, Profile>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::NotFound("User"))
    }

    async fn venue_suspended(&self, venue_id: Uuid) -> ServiceResult<bool> {
        let row: Option<(bool,)> = sqlx::query_as("SELECT suspended FROM venues WHERE id = $1")
            .bind(venue_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(s,)| s).ok_or(ServiceError::NotFound("Venue"))
    }

    /// Email and password sign-in. Unknown users and wrong passwords share one error.
    pub async fn login(&self, email: &str, password_attempt: &str) -> ServiceResult<SessionToken> {
        const INVALID: ServiceError = ServiceError::Unauthorized("Invalid email or password");

        let email = normalize_email(email).map_err(|_| INVALID)?;
        let profile = self.profile_by_email(&email).await?.ok_or(INVALID)?;

        let hash: Option<(String,)> = sqlx::query_as("SELECT password_hash FROM credentials WHERE user_id = $1")
            .bind(profile.id)
            .fetch_optional(&self.pool)
            .await?;
        let verified = hash.map(|(h,)| password::verify_password(password_attempt, &h)).unwrap_or(false);
        if !verified {
            tracing::info!("Failed login for {}", email);
            return Err(INVALID);
        }
        if !profile.can_sign_in() {
            return Err(ServiceError::Unauthorized("Account is disabled"));
        }

        let role = resolve_role(&self.pool, profile.id, profile.venue_id).await?;
        if role != Some(Role::SuperAdmin) {
            if let Some(venue_id) = profile.venue_id {
                if self.venue_suspended(venue_id).await? {
                    return Err(AccessError::VenueSuspended.into());
                }
            }
        }

        let claims = Claims::new(profile.id, profile.email.clone(), role, profile.venue_id);
        tracing::info!("User {} signed in ({:?})", profile.email, role);
        SessionToken::issue(&profile, role, claims)
    }

    /// Always succeeds for well-formed emails so callers cannot probe accounts.
    /// Returns the raw token only when development token exposure is on.
    pub async fn request_password_reset(&self, email: &str) -> ServiceResult<Option<String>> {
        let email = normalize_email(email)?;
        rate_limit::check_and_record(&self.pool, RateScope::PasswordReset, &email).await?;

        let Some(profile) = self.profile_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(None);
        };
        if !profile.can_sign_in() {
            return Ok(None);
        }

        let security = &config::config().security;
        let token = tokens::random_token(40);
        sqlx::query(
            "INSERT INTO password_resets (id, user_id, token_hash, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(profile.id)
        .bind(tokens::hash_token(&token))
        .bind(Utc::now() + Duration::minutes(security.password_reset_ttl_minutes))
        .execute(&self.pool)
        .await?;

        tracing::info!("Password reset issued for {}", profile.email);
        if security.expose_dev_tokens {
            tracing::debug!("Password reset token for {}: {}", profile.email, token);
            return Ok(Some(token));
        }
        Ok(None)
    }

    pub async fn confirm_password_reset(&self, token: &str, new_password: &str) -> ServiceResult<()> {
        let password_hash = password::hash_password(new_password)?;

        let mut tx = self.pool.begin().await?;
        let reset: Option<(Uuid, Uuid)> = sqlx::query_as(
            r#"
            SELECT id, user_id FROM password_resets
            WHERE token_hash = $1 AND used_at IS NULL AND expires_at > NOW()
            FOR UPDATE
            "#,
        )
        .bind(tokens::hash_token(token))
        .fetch_optional(&mut *tx)
        .await?;
        let (_, user_id) = reset.ok_or_else(|| ServiceError::validation(INVALID_RESET))?;

        // One successful reset burns every outstanding link for the account.
        sqlx::query(INVALIDATE_RESETS).bind(user_id).execute(&mut *tx).await?;

        let sql = format!("SELECT {} FROM profiles WHERE id = $1 FOR UPDATE", PROFILE_COLUMNS);
        let profile = sqlx::query_as::<_, Profile>(&sql).bind(user_id).fetch_one(&mut *tx).await?;
        if !profile.can_sign_in() {
            tx.commit().await?;
            tracing::info!("Password reset refused for disabled account {}", profile.email);
            return Err(ServiceError::validation(INVALID_RESET));
        }
        upsert_credential(&mut tx, user_id, &password_hash).await?;

        let scope = match profile.venue_id {
            Some(venue_id) => TenantScope::Tenant { venue_id, impersonated: false },
            None => TenantScope::Platform,
        };
        let event = AuditEvent::new(&Actor { user_id, scope }, AuditAction::SetPassword, TargetType::User)
            .target(user_id)
            .details(json!({ "via": "password_reset" }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Redeem an invitation: creates the member and signs them in.
    pub async fn accept_invitation(&self, token: &str, full_name: &str, new_password: &str) -> ServiceResult<SessionToken> {
        let full_name = required_text("Full name", full_name, MAX_NAME_LEN)?;
        let password_hash = password::hash_password(new_password)?;

        let mut tx = self.pool.begin().await?;
        let invitation: Option<(Uuid, Uuid, String, String)> = sqlx::query_as(
            r#"
            SELECT id, venue_id, email, tenant_role FROM invitations
            WHERE token_hash = $1 AND accepted_at IS NULL AND expires_at > NOW()
            FOR UPDATE
            "#,
        )
        .bind(tokens::hash_token(token))
        .fetch_optional(&mut *tx)
        .await?;
        let (invitation_id, venue_id, email, role) =
            invitation.ok_or_else(|| ServiceError::validation("Invitation is invalid or has expired"))?;
        let role = TenantRole::parse(&role).ok_or_else(|| ServiceError::validation("Invitation role is invalid"))?;

        let (suspended,): (bool,) = sqlx::query_as("SELECT suspended FROM venues WHERE id = $1")
            .bind(venue_id)
            .fetch_one(&mut *tx)
            .await?;
        if suspended {
            return Err(AccessError::VenueSuspended.into());
        }

        enforce_new_member(&mut *tx, venue_id, role).await?;
        let member = insert_member(&mut tx, venue_id, &email, &full_name, role, &password_hash).await?;

        sqlx::query("UPDATE invitations SET accepted_at = NOW() WHERE id = $1")
            .bind(invitation_id)
            .execute(&mut *tx)
            .await?;

        let actor = Actor { user_id: member.id, scope: TenantScope::Tenant { venue_id, impersonated: false } };
        let event = AuditEvent::new(&actor, AuditAction::AcceptInvitation, TargetType::Invitation)
            .target(invitation_id)
            .details(json!({ "email": email, "role": role }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;

        tracing::info!("Invitation {} accepted by {}", invitation_id, email);
        let profile = self.profile_by_id(member.id).await?;
        let role = Some(Role::from(role));
        let claims = Claims::new(profile.id, profile.email.clone(), role, profile.venue_id);
        SessionToken::issue(&profile, role, claims)
    }

    /// Short-lived token acting inside `venue_id`.
    pub async fn start_impersonation(&self, actor: &Actor, venue_id: Uuid) -> ServiceResult<SessionToken> {
        let profile = self.profile_by_id(actor.user_id).await?;
        let venue: Option<Venue> =
            sqlx::query_as("SELECT id, name, slug, suspended, created_at, updated_at FROM venues WHERE id = $1")
                .bind(venue_id)
                .fetch_optional(&self.pool)
                .await?;
        let venue = venue.ok_or(ServiceError::NotFound("Venue"))?;

        let role = Some(Role::SuperAdmin);
        let claims = Claims::new(profile.id, profile.email.clone(), role, profile.venue_id).impersonate(venue.id);
        let session = SessionToken::issue(&profile, role, claims)?;

        let mut conn = self.pool.acquire().await?;
        let event = AuditEvent::new(actor, AuditAction::StartImpersonation, TargetType::Venue)
            .target(venue.id)
            .in_venue(venue.id)
            .details(json!({ "venue": venue.slug }));
        audit::record(&mut conn, &event).await?;

        tracing::info!("Super-admin {} impersonating venue {}", profile.email, venue.slug);
        Ok(session)
    }

    /// Back to a platform-scoped token.
    pub async fn stop_impersonation(&self, actor: &Actor) -> ServiceResult<SessionToken> {
        let profile = self.profile_by_id(actor.user_id).await?;
        let role = Some(Role::SuperAdmin);
        let claims = Claims::new(profile.id, profile.email.clone(), role, profile.venue_id);
        let session = SessionToken::issue(&profile, role, claims)?;

        if let Some(venue_id) = actor.scope.venue_id() {
            let mut conn = self.pool.acquire().await?;
            let event = AuditEvent::new(actor, AuditAction::StopImpersonation, TargetType::Venue).target(venue_id);
            audit::record(&mut conn, &event).await?;
        }
        Ok(session)
    }

    /// Operator bootstrap: create (or promote) a platform super-admin.
    pub async fn create_super_admin(&self, email: &str, full_name: &str, new_password: &str) -> ServiceResult<Uuid> {
        let email = normalize_email(email)?;
        let full_name = required_text("Full name", full_name, MAX_NAME_LEN)?;
        let password_hash = password::hash_password(new_password)?;

        let mut tx = self.pool.begin().await?;
        let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM profiles WHERE email = $1")
            .bind(&email)
            .fetch_optional(&mut *tx)
            .await?;
        let user_id = match existing {
            Some((id,)) => id,
            None => {
                let id = Uuid::new_v4();
                sqlx::query("INSERT INTO profiles (id, venue_id, email, full_name) VALUES ($1, NULL, $2, $3)")
                    .bind(id)
                    .bind(&email)
                    .bind(&full_name)
                    .execute(&mut *tx)
                    .await?;
                id
            }
        };
        upsert_credential(&mut tx, user_id, &password_hash).await?;
        sqlx::query("INSERT INTO super_admins (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!("Super-admin {} ready ({})", email, user_id);
        Ok(user_id)
    }
}
