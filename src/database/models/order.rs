use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::orders::{OrderStatus, PaymentMethod, TransitionError};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub table_id: Uuid,
    pub status: String,
    pub payment_method: String,
    pub payment_confirmed: bool,
    pub total: Decimal,
    pub guest_note: Option<String>,
    #[serde(skip_serializing)]
    pub guest_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn status(&self) -> Result<OrderStatus, TransitionError> {
        OrderStatus::parse(&self.status)
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        PaymentMethod::parse(&self.payment_method)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub menu_item_id: Option<Uuid>,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentClaim {
    pub id: Uuid,
    pub order_id: Uuid,
    pub venue_id: Uuid,
    pub reference: String,
    pub amount: Decimal,
    pub proof_path: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentConfirmation {
    pub id: Uuid,
    pub order_id: Uuid,
    pub venue_id: Uuid,
    pub confirmed_by: Uuid,
    pub note: Option<String>,
    pub confirmed_at: DateTime<Utc>,
}
