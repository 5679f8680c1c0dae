use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DiningTable {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub label: String,
    pub qr_token: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
