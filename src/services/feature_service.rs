use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::{self, Actor, AuditAction, AuditEvent, TargetType};
use crate::database::manager::DatabaseManager;
use crate::database::models::FeatureFlag;

use super::validation::validate_flag_key;
use super::{ServiceError, ServiceResult};

pub struct FeatureService {
    pool: PgPool,
}

impl FeatureService {
    pub async fn new() -> ServiceResult<Self> {
        let pool = DatabaseManager::main_pool().await?;
        Ok(Self { pool })
    }

    pub async fn list(&self, venue_id: Uuid) -> ServiceResult<Vec<FeatureFlag>> {
        Ok(sqlx::query_as::<_, FeatureFlag>(
            "SELECT venue_id, key, enabled, updated_at FROM feature_flags WHERE venue_id = $1 ORDER BY key",
        )
        .bind(venue_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn set(&self, actor: &Actor, venue_id: Uuid, key: &str, enabled: bool) -> ServiceResult<FeatureFlag> {
        let key = validate_flag_key(key)?;

        let mut tx = self.pool.begin().await?;
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM venues WHERE id = $1")
            .bind(venue_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(ServiceError::NotFound("Venue"));
        }

        let flag = sqlx::query_as::<_, FeatureFlag>(
            r#"
            INSERT INTO feature_flags (venue_id, key, enabled, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (venue_id, key) DO UPDATE SET enabled = EXCLUDED.enabled, updated_at = NOW()
            RETURNING venue_id, key, enabled, updated_at
            "#,
        )
        .bind(venue_id)
        .bind(&key)
        .bind(enabled)
        .fetch_one(&mut *tx)
        .await?;

        let event = AuditEvent::new(actor, AuditAction::SetFeatureFlag, TargetType::FeatureFlag)
            .target(&key)
            .in_venue(venue_id)
            .details(json!({ "enabled": enabled }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;

        Ok(flag)
    }
}
