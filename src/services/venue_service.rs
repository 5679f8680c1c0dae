use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::access::TenantRole;
use crate::audit::{self, Actor, AuditAction, AuditEvent, TargetType};
use crate::auth::password;
use crate::database::manager::DatabaseManager;
use crate::database::models::{Member, Venue};

use super::user_service::insert_member;
use super::validation::{normalize_email, required_text, validate_slug, MAX_NAME_LEN};
use super::{ServiceError, ServiceResult};

const VENUE_COLUMNS: &str = "id, name, slug, suspended, created_at, updated_at";

/// First tenant-admin created together with a venue.
#[derive(Debug, Deserialize)]
pub struct InitialAdmin {
    pub email: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateVenue {
    pub name: String,
    pub slug: String,
    pub admin: Option<InitialAdmin>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateVenue {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub suspended: Option<bool>,
}

#[derive(Debug, serde::Serialize)]
pub struct VenueCreated {
    #[serde(flatten)]
    pub venue: Venue,
    pub admin: Option<Member>,
}

pub struct VenueService {
    pool: PgPool,
}

impl VenueService {
    pub async fn new() -> ServiceResult<Self> {
        let pool = DatabaseManager::main_pool().await?;
        Ok(Self { pool })
    }

    pub async fn list_venues(&self) -> ServiceResult<Vec<Venue>> {
        let sql = format!("SELECT {} FROM venues ORDER BY created_at DESC", VENUE_COLUMNS);
        Ok(sqlx::query_as::<_, Venue>(&sql).fetch_all(&self.pool).await?)
    }

    pub async fn get_venue(&self, venue_id: Uuid) -> ServiceResult<Venue> {
        let sql = format!("SELECT {} FROM venues WHERE id = $1", VENUE_COLUMNS);
        sqlx::query_as::<_, Venue>(&sql)
            .bind(venue_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::NotFound("Venue"))
    }

    /// Create a venue and, optionally, its first tenant-admin in one transaction.
    pub async fn create_venue(&self, actor: &Actor, input: CreateVenue) -> ServiceResult<VenueCreated> {
        let name = required_text("Name", &input.name, MAX_NAME_LEN)?;
        let slug = validate_slug(&input.slug)?;
        let admin = match &input.admin {
            Some(admin) => Some((
                normalize_email(&admin.email)?,
                required_text("Full name", &admin.full_name, MAX_NAME_LEN)?,
                password::hash_password(&admin.password)?,
            )),
            None => None,
        };

        let mut tx = self.pool.begin().await?;
        let sql = format!("INSERT INTO venues (id, name, slug) VALUES ($1, $2, $3) RETURNING {}", VENUE_COLUMNS);
        let venue = match sqlx::query_as::<_, Venue>(&sql)
            .bind(Uuid::new_v4())
            .bind(&name)
            .bind(&slug)
            .fetch_one(&mut *tx)
            .await
        {
            Ok(venue) => venue,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(ServiceError::Conflict(format!("Venue slug '{}' is already taken", slug)));
            }
            Err(e) => return Err(e.into()),
        };

        let admin = match admin {
            Some((email, full_name, hash)) => {
                Some(insert_member(&mut tx, venue.id, &email, &full_name, TenantRole::TenantAdmin, &hash).await?)
            }
            None => None,
        };

        let event = AuditEvent::new(actor, AuditAction::CreateVenue, TargetType::Venue)
            .target(venue.id)
            .in_venue(venue.id)
            .details(json!({
                "name": venue.name,
                "slug": venue.slug,
                "admin": admin.as_ref().map(|m| m.email.clone()),
            }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;

        tracing::info!("Created venue {} ({})", venue.slug, venue.id);
        Ok(VenueCreated { venue, admin })
    }

    /// Rename, re-slug, suspend or reinstate a venue.
    pub async fn update_venue(&self, actor: &Actor, venue_id: Uuid, input: UpdateVenue) -> ServiceResult<Venue> {
        let name = input.name.as_deref().map(|n| required_text("Name", n, MAX_NAME_LEN)).transpose()?;
        let slug = input.slug.as_deref().map(validate_slug).transpose()?;

        let mut tx = self.pool.begin().await?;
        let before = {
            let sql = format!("SELECT {} FROM venues WHERE id = $1 FOR UPDATE", VENUE_COLUMNS);
            sqlx::query_as::<_, Venue>(&sql)
                .bind(venue_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(ServiceError::NotFound("Venue"))?
        };

        let sql = format!(
            r#"
            UPDATE venues
            SET name = COALESCE($2, name),
                slug = COALESCE($3, slug),
                suspended = COALESCE($4, suspended),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            VENUE_COLUMNS
        );
        let venue = match sqlx::query_as::<_, Venue>(&sql)
            .bind(venue_id)
            .bind(&name)
            .bind(&slug)
            .bind(input.suspended)
            .fetch_one(&mut *tx)
            .await
        {
            Ok(venue) => venue,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(ServiceError::Conflict("Venue slug is already taken".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let action = match (before.suspended, venue.suspended) {
            (false, true) => AuditAction::SuspendVenue,
            (true, false) => AuditAction::ReinstateVenue,
            _ => AuditAction::UpdateVenue,
        };
        let event = AuditEvent::new(actor, action, TargetType::Venue)
            .target(venue.id)
            .in_venue(venue.id)
            .details(json!({ "name": name, "slug": slug, "suspended": input.suspended }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;

        if action == AuditAction::SuspendVenue {
            tracing::warn!("Venue {} suspended", venue.slug);
        }
        Ok(venue)
    }
}
