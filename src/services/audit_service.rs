use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::access::TenantScope;
use crate::audit::AuditEntry;
use crate::database::manager::DatabaseManager;

use super::validation::page;
use super::ServiceResult;

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub action: Option<String>,
    pub venue_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Venue filter for a query. Tenant sessions are pinned to their venue
/// whatever they ask for.
pub fn venue_filter(scope: &TenantScope, requested: Option<Uuid>) -> Option<Uuid> {
    match scope {
        TenantScope::Tenant { venue_id, .. } => Some(*venue_id),
        TenantScope::Platform => requested,
    }
}

pub struct AuditService {
    pool: PgPool,
}

impl AuditService {
    pub async fn new() -> ServiceResult<Self> {
        let pool = DatabaseManager::main_pool().await?;
        Ok(Self { pool })
    }

    /// Newest first.
    pub async fn list(&self, scope: &TenantScope, query: AuditQuery) -> ServiceResult<Vec<AuditEntry>> {
        let venue_id = venue_filter(scope, query.venue_id);
        let (limit, offset) = page(query.limit, query.offset);

        Ok(sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, actor_id, venue_id, impersonating, action, target_type, target_id, details, created_at
            FROM audit_events
            WHERE ($1::uuid IS NULL OR venue_id = $1)
              AND ($2::text IS NULL OR action = $2)
              AND ($3::uuid IS NULL OR actor_id = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(venue_id)
        .bind(&query.action)
        .bind(query.actor_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_sessions_cannot_widen_the_filter() {
        let own = Uuid::new_v4();
        let other = Uuid::new_v4();
        let scope = TenantScope::Tenant { venue_id: own, impersonated: false };
        assert_eq!(venue_filter(&scope, Some(other)), Some(own));
        assert_eq!(venue_filter(&scope, None), Some(own));
    }

    #[test]
    fn platform_sessions_pick_any_venue() {
        let venue = Uuid::new_v4();
        assert_eq!(venue_filter(&TenantScope::Platform, Some(venue)), Some(venue));
        assert_eq!(venue_filter(&TenantScope::Platform, None), None);
    }
}
