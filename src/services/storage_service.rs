use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;

use crate::access::TenantScope;
use crate::audit::{self, Actor, AuditAction, AuditEvent, TargetType};
use crate::database::manager::DatabaseManager;
use crate::storage::{self, SignedUrl, SignedUrlIssuer, StorageError};

use super::ServiceResult;

/// Tenant sessions may only sign objects under their venue prefix.
pub fn authorize_path(scope: &TenantScope, path: &str) -> Result<(), StorageError> {
    match scope {
        TenantScope::Tenant { venue_id, .. } => storage::ensure_venue_path(path, *venue_id),
        TenantScope::Platform => storage::validate_path(path),
    }
}

pub struct StorageService {
    pool: PgPool,
    issuer: SignedUrlIssuer,
}

impl StorageService {
    pub async fn new() -> ServiceResult<Self> {
        let pool = DatabaseManager::main_pool().await?;
        let issuer = SignedUrlIssuer::from_config()?;
        Ok(Self { pool, issuer })
    }

    pub async fn issue_signed_url(&self, actor: &Actor, path: &str) -> ServiceResult<SignedUrl> {
        authorize_path(&actor.scope, path)?;
        let signed = self.issuer.issue(path, Utc::now())?;

        let mut conn = self.pool.acquire().await?;
        let event = AuditEvent::new(actor, AuditAction::IssueSignedUrl, TargetType::StorageObject)
            .target(path)
            .details(json!({ "expires_at": signed.expires_at }));
        audit::record(&mut conn, &event).await?;

        Ok(signed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn tenant_paths_are_confined_to_the_venue() {
        let venue = Uuid::new_v4();
        let other = Uuid::new_v4();
        let scope = TenantScope::Tenant { venue_id: venue, impersonated: true };
        let own = format!("{}menu/latte.jpg", storage::venue_prefix(venue));
        let foreign = format!("{}menu/latte.jpg", storage::venue_prefix(other));

        assert!(authorize_path(&scope, &own).is_ok());
        assert_eq!(authorize_path(&scope, &foreign), Err(StorageError::ForeignPath));
    }

    #[test]
    fn platform_paths_only_need_to_be_well_formed() {
        assert!(authorize_path(&TenantScope::Platform, "exports/2024.csv").is_ok());
        assert!(authorize_path(&TenantScope::Platform, "../secrets").is_err());
    }
}
