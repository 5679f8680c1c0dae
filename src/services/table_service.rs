use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::access::AccessError;
use crate::audit::{self, Actor, AuditAction, AuditEvent, TargetType};
use crate::auth::tokens;
use crate::database::manager::DatabaseManager;
use crate::database::models::{DiningTable, Venue};

use super::validation::required_text;
use super::{ServiceError, ServiceResult};

const TABLE_COLUMNS: &str = "id, venue_id, label, qr_token, is_active, created_at";
const QR_TOKEN_LEN: usize = 24;
const MAX_LABEL_LEN: usize = 50;

#[derive(Debug, Deserialize)]
pub struct TableInput {
    pub label: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TablePatch {
    pub label: Option<String>,
    pub is_active: Option<bool>,
}

fn map_label_conflict(err: sqlx::Error) -> ServiceError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ServiceError::Conflict("A table with this label already exists".to_string())
        }
        _ => err.into(),
    }
}

/// Resolve a QR token to its active table and open venue.
pub async fn table_for_guest(pool: &PgPool, qr_token: &str) -> ServiceResult<(DiningTable, Venue)> {
    let sql = format!("SELECT {} FROM tables WHERE qr_token = $1 AND is_active", TABLE_COLUMNS);
    let table = sqlx::query_as::<_, DiningTable>(&sql)
        .bind(qr_token)
        .fetch_optional(pool)
        .await?
        .ok_or(ServiceError::NotFound("Table"))?;

    let venue: Venue = sqlx::query_as("SELECT id, name, slug, suspended, created_at, updated_at FROM venues WHERE id = $1")
        .bind(table.venue_id)
        .fetch_one(pool)
        .await?;
    if venue.suspended {
        return Err(AccessError::VenueSuspended.into());
    }
    Ok((table, venue))
}

pub struct TableService {
    pool: PgPool,
}

impl TableService {
    pub async fn new() -> ServiceResult<Self> {
        let pool = DatabaseManager::main_pool().await?;
        Ok(Self { pool })
    }

    pub async fn list(&self, venue_id: Uuid) -> ServiceResult<Vec<DiningTable>> {
        let sql = format!("SELECT {} FROM tables WHERE venue_id = $1 ORDER BY label", TABLE_COLUMNS);
        Ok(sqlx::query_as::<_, DiningTable>(&sql).bind(venue_id).fetch_all(&self.pool).await?)
    }

    pub async fn get(&self, venue_id: Uuid, id: Uuid) -> ServiceResult<DiningTable> {
        let sql = format!("SELECT {} FROM tables WHERE venue_id = $1 AND id = $2", TABLE_COLUMNS);
        sqlx::query_as::<_, DiningTable>(&sql)
            .bind(venue_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::NotFound("Table"))
    }

    pub async fn create(&self, actor: &Actor, venue_id: Uuid, input: TableInput) -> ServiceResult<DiningTable> {
        let label = required_text("Label", &input.label, MAX_LABEL_LEN)?;

        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "INSERT INTO tables (id, venue_id, label, qr_token) VALUES ($1, $2, $3, $4) RETURNING {}",
            TABLE_COLUMNS
        );
        let table = sqlx::query_as::<_, DiningTable>(&sql)
            .bind(Uuid::new_v4())
            .bind(venue_id)
            .bind(&label)
            .bind(tokens::random_token(QR_TOKEN_LEN))
            .fetch_one(&mut *tx)
            .await
            .map_err(map_label_conflict)?;

        let event = AuditEvent::new(actor, AuditAction::CreateTable, TargetType::Table)
            .target(table.id)
            .details(json!({ "label": table.label }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(table)
    }

    pub async fn update(&self, actor: &Actor, venue_id: Uuid, id: Uuid, patch: TablePatch) -> ServiceResult<DiningTable> {
        let label = patch.label.as_deref().map(|l| required_text("Label", l, MAX_LABEL_LEN)).transpose()?;

        let mut tx = self.pool.begin().await?;
        let sql = format!(
            r#"
            UPDATE tables
            SET label = COALESCE($3, label),
                is_active = COALESCE($4, is_active)
            WHERE venue_id = $1 AND id = $2
            RETURNING {}
            "#,
            TABLE_COLUMNS
        );
        let table = sqlx::query_as::<_, DiningTable>(&sql)
            .bind(venue_id)
            .bind(id)
            .bind(&label)
            .bind(patch.is_active)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_label_conflict)?
            .ok_or(ServiceError::NotFound("Table"))?;

        let event = AuditEvent::new(actor, AuditAction::UpdateTable, TargetType::Table)
            .target(id)
            .details(json!({ "label": label, "is_active": patch.is_active }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(table)
    }

    /// Deleting a table removes its order history.
    pub async fn delete(&self, actor: &Actor, venue_id: Uuid, id: Uuid) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;
        let deleted: Option<(String,)> = sqlx::query_as("DELETE FROM tables WHERE venue_id = $1 AND id = $2 RETURNING label")
            .bind(venue_id)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let (label,) = deleted.ok_or(ServiceError::NotFound("Table"))?;

        let event = AuditEvent::new(actor, AuditAction::DeleteTable, TargetType::Table)
            .target(id)
            .details(json!({ "label": label }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Issue a fresh QR token; printed codes with the old token stop working.
    pub async fn rotate_qr(&self, actor: &Actor, venue_id: Uuid, id: Uuid) -> ServiceResult<DiningTable> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "UPDATE tables SET qr_token = $3 WHERE venue_id = $1 AND id = $2 RETURNING {}",
            TABLE_COLUMNS
        );
        let table = sqlx::query_as::<_, DiningTable>(&sql)
            .bind(venue_id)
            .bind(id)
            .bind(tokens::random_token(QR_TOKEN_LEN))
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ServiceError::NotFound("Table"))?;

        let event = AuditEvent::new(actor, AuditAction::RotateTableQr, TargetType::Table).target(id);
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;

        tracing::info!("Rotated QR token for table {} in venue {}", table.label, venue_id);
        Ok(table)
    }
}
