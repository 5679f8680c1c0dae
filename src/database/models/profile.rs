use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::access::TenantRole;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub venue_id: Option<Uuid>,
    pub email: String,
    pub full_name: String,
    pub is_active: bool,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Active and not archived.
    pub fn can_sign_in(&self) -> bool {
        self.is_active && !self.is_archived
    }
}

/// Profile joined with its role inside one venue.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Member {
    pub id: Uuid,
    pub venue_id: Option<Uuid>,
    pub email: String,
    pub full_name: String,
    pub is_active: bool,
    pub is_archived: bool,
    pub tenant_role: String,
    pub created_at: DateTime<Utc>,
}

impl Member {
    pub fn role(&self) -> Option<TenantRole> {
        TenantRole::parse(&self.tenant_role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(is_active: bool, is_archived: bool) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            venue_id: None,
            email: "ana@example.com".into(),
            full_name: "Ana".into(),
            is_active,
            is_archived,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn only_active_unarchived_profiles_sign_in() {
        assert!(profile(true, false).can_sign_in());
        assert!(!profile(false, false).can_sign_in());
        assert!(!profile(true, true).can_sign_in());
        assert!(!profile(false, true).can_sign_in());
    }
}
