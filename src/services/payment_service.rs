use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::{self, Actor, AuditAction, AuditEvent, TargetType};
use crate::database::manager::DatabaseManager;
use crate::database::models::{BankDetails, Order, PaymentClaim};
use crate::orders::PaymentMethod;
use crate::storage;

use super::order_service::{expire_if_overdue, is_payment_overdue, lock_guest_order, payment_window};
use super::validation::{optional_text, required_text, validate_price, MAX_NAME_LEN};
use super::{ServiceError, ServiceResult};

const BANK_COLUMNS: &str = "venue_id, account_holder, bank_name, account_number, reference_hint, updated_at";
const MAX_REFERENCE_LEN: usize = 100;
const MAX_ACCOUNT_LEN: usize = 64;

#[derive(Debug, Deserialize)]
pub struct PaymentClaimInput {
    pub reference: String,
    pub amount: Decimal,
    pub proof_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BankDetailsInput {
    pub account_holder: String,
    pub bank_name: String,
    pub account_number: String,
    pub reference_hint: Option<String>,
}

/// Where a guest should send a transfer.
#[derive(Debug, Serialize)]
pub struct TransferInstructions {
    pub account_holder: String,
    pub bank_name: String,
    pub account_number: String,
    pub reference_hint: Option<String>,
    pub amount: Decimal,
    pub order_id: Uuid,
}

/// A guest may claim a transfer while the order is unpaid, still live and
/// inside its payment window.
pub fn ensure_claimable(order: &Order, now: DateTime<Utc>, window: Duration) -> ServiceResult<()> {
    if order.payment_method() != Some(PaymentMethod::Transfer) {
        return Err(ServiceError::validation("Order is not paid by transfer"));
    }
    if order.payment_confirmed {
        return Err(ServiceError::Conflict("Payment is already confirmed".to_string()));
    }
    if order.status()?.is_terminal() {
        return Err(ServiceError::Conflict(format!("Order is already {}", order.status)));
    }
    if is_payment_overdue(order, now, window) {
        return Err(ServiceError::Conflict("Payment window has closed".to_string()));
    }
    Ok(())
}

pub struct PaymentService {
    pool: PgPool,
}

impl PaymentService {
    pub async fn new() -> ServiceResult<Self> {
        let pool = DatabaseManager::main_pool().await?;
        Ok(Self { pool })
    }

    async fn fetch_bank_details(&self, venue_id: Uuid) -> ServiceResult<Option<BankDetails>> {
        let sql = format!("SELECT {} FROM bank_details WHERE venue_id = $1", BANK_COLUMNS);
        Ok(sqlx::query_as::<_, BankDetails>(&sql)
            .bind(venue_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Bank details for a guest's transfer order.
    pub async fn transfer_instructions(&self, order_id: Uuid, guest_token: &str) -> ServiceResult<TransferInstructions> {
        let mut tx = self.pool.begin().await?;
        let order = lock_guest_order(&mut tx, order_id, guest_token).await?;
        let order = expire_if_overdue(&mut tx, order).await?;
        tx.commit().await?;
        ensure_claimable(&order, Utc::now(), payment_window())?;

        let bank = self
            .fetch_bank_details(order.venue_id)
            .await?
            .ok_or(ServiceError::NotFound("Bank details"))?;

        Ok(TransferInstructions {
            account_holder: bank.account_holder,
            bank_name: bank.bank_name,
            account_number: bank.account_number,
            reference_hint: bank.reference_hint,
            amount: order.total,
            order_id: order.id,
        })
    }

    /// Guest reports a transfer. Staff still confirm it separately.
    pub async fn submit_claim(&self, order_id: Uuid, guest_token: &str, input: PaymentClaimInput) -> ServiceResult<PaymentClaim> {
        let reference = required_text("Reference", &input.reference, MAX_REFERENCE_LEN)?;
        let amount = validate_price(input.amount)?;

        let mut tx = self.pool.begin().await?;
        let order = lock_guest_order(&mut tx, order_id, guest_token).await?;
        let order = expire_if_overdue(&mut tx, order).await?;
        if let Err(e) = ensure_claimable(&order, Utc::now(), payment_window()) {
            // Keep the expiry even though the claim is refused.
            tx.commit().await?;
            return Err(e);
        }
        if let Some(path) = &input.proof_path {
            storage::ensure_venue_path(path, order.venue_id)?;
        }

        let claim = sqlx::query_as::<_, PaymentClaim>(
            r#"
            INSERT INTO payment_claims (id, order_id, venue_id, reference, amount, proof_path)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, order_id, venue_id, reference, amount, proof_path, submitted_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.id)
        .bind(order.venue_id)
        .bind(&reference)
        .bind(amount)
        .bind(&input.proof_path)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        if amount != order.total {
            tracing::warn!("Payment claim for order {} is {} but total is {}", order.id, amount, order.total);
        }
        Ok(claim)
    }

    pub async fn get_bank_details(&self, venue_id: Uuid) -> ServiceResult<BankDetails> {
        self.fetch_bank_details(venue_id)
            .await?
            .ok_or(ServiceError::NotFound("Bank details"))
    }

    pub async fn upsert_bank_details(&self, actor: &Actor, venue_id: Uuid, input: BankDetailsInput) -> ServiceResult<BankDetails> {
        let account_holder = required_text("Account holder", &input.account_holder, MAX_NAME_LEN)?;
        let bank_name = required_text("Bank name", &input.bank_name, MAX_NAME_LEN)?;
        let account_number = required_text("Account number", &input.account_number, MAX_ACCOUNT_LEN)?;
        let reference_hint = optional_text("Reference hint", input.reference_hint.as_deref(), MAX_REFERENCE_LEN)?;

        let mut tx = self.pool.begin().await?;
        let sql = format!(
            r#"
            INSERT INTO bank_details (venue_id, account_holder, bank_name, account_number, reference_hint, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (venue_id) DO UPDATE
            SET account_holder = EXCLUDED.account_holder,
                bank_name = EXCLUDED.bank_name,
                account_number = EXCLUDED.account_number,
                reference_hint = EXCLUDED.reference_hint,
                updated_at = NOW()
            RETURNING {}
            "#,
            BANK_COLUMNS
        );
        let details = sqlx::query_as::<_, BankDetails>(&sql)
            .bind(venue_id)
            .bind(&account_holder)
            .bind(&bank_name)
            .bind(&account_number)
            .bind(&reference_hint)
            .fetch_one(&mut *tx)
            .await?;

        // Account numbers stay out of the audit trail.
        let event = AuditEvent::new(actor, AuditAction::UpdateBankDetails, TargetType::BankDetails)
            .target(venue_id)
            .details(json!({ "bank_name": bank_name, "account_holder": account_holder }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;

        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::OrderStatus;

    fn window() -> Duration {
        Duration::minutes(30)
    }

    fn claimable(order: &Order) -> ServiceResult<()> {
        ensure_claimable(order, Utc::now(), window())
    }

    fn order(method: PaymentMethod, status: OrderStatus, confirmed: bool) -> Order {
        Order {
            id: Uuid::new_v4(),
            venue_id: Uuid::new_v4(),
            table_id: Uuid::new_v4(),
            status: status.as_str().into(),
            payment_method: method.as_str().into(),
            payment_confirmed: confirmed,
            total: Decimal::new(1250, 2),
            guest_note: None,
            guest_token: "token".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn open_transfer_orders_are_claimable() {
        assert!(claimable(&order(PaymentMethod::Transfer, OrderStatus::PendingPayment, false)).is_ok());
        assert!(claimable(&order(PaymentMethod::Transfer, OrderStatus::Preparing, false)).is_ok());
    }

    #[test]
    fn cash_confirmed_and_closed_orders_are_not() {
        assert!(matches!(
            claimable(&order(PaymentMethod::Cash, OrderStatus::CashOnDelivery, false)),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            claimable(&order(PaymentMethod::Transfer, OrderStatus::Confirmed, true)),
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            claimable(&order(PaymentMethod::Transfer, OrderStatus::Expired, false)),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn overdue_transfer_orders_are_not_claimable() {
        let mut late = order(PaymentMethod::Transfer, OrderStatus::PendingPayment, false);
        late.created_at = Utc::now() - window() - Duration::minutes(1);
        assert!(matches!(claimable(&late), Err(ServiceError::Conflict(_))));

        // Same order, checked before the window closed.
        let before = late.created_at + Duration::minutes(5);
        assert!(ensure_claimable(&late, before, window()).is_ok());

        // Once staff have moved it on, the window no longer applies.
        late.status = OrderStatus::Preparing.as_str().into();
        assert!(claimable(&late).is_ok());
    }
}
