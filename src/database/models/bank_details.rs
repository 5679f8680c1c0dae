use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BankDetails {
    pub venue_id: Uuid,
    pub account_holder: String,
    pub bank_name: String,
    pub account_number: String,
    pub reference_hint: Option<String>,
    pub updated_at: DateTime<Utc>,
}
