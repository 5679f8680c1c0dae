use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeatureFlag {
    pub venue_id: Uuid,
    pub key: String,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}
