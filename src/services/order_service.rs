//! Guest ordering and staff fulfilment.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::access::AccessError;
use crate::audit::{self, Actor, AuditAction, AuditEvent, TargetType};
use crate::auth::tokens;
use crate::config;
use crate::database::manager::DatabaseManager;
use crate::database::models::{MenuItem, Order, OrderItem, PaymentClaim, PaymentConfirmation};
use crate::orders::{OrderStatus, PaymentMethod, TransitionError};

use super::rate_limit::{self, RateScope};
use super::table_service::table_for_guest;
use super::validation::{optional_text, page, MAX_NOTE_LEN};
use super::{ServiceError, ServiceResult};

pub const MAX_QUANTITY: i32 = 99;
pub const MAX_LINES: usize = 50;
const GUEST_TOKEN_LEN: usize = 32;

pub(crate) const ORDER_COLUMNS: &str = "id, venue_id, table_id, status, payment_method, payment_confirmed, total, guest_note, guest_token, created_at, updated_at";

#[derive(Debug, Clone, Deserialize)]
pub struct OrderLine {
    pub menu_item_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrder {
    pub payment_method: PaymentMethod,
    pub items: Vec<OrderLine>,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<String>,
    pub table_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A line priced from the menu at submission time.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub menu_item_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// What a guest sees of their order.
#[derive(Debug, Serialize)]
pub struct GuestOrder {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub can_cancel: bool,
}

#[derive(Debug, Serialize)]
pub struct GuestOrderCreated {
    pub order: GuestOrder,
    /// Credential for polling, cancelling and paying this order.
    pub guest_token: String,
}

/// Staff view of an order.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub claims: Vec<PaymentClaim>,
    pub confirmation: Option<PaymentConfirmation>,
    pub next_actions: &'static [OrderStatus],
}

#[derive(Debug, Serialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    pub next_actions: &'static [OrderStatus],
}

pub fn validate_lines(lines: &[OrderLine]) -> ServiceResult<()> {
    if lines.is_empty() {
        return Err(ServiceError::validation("Order must contain at least one item"));
    }
    if lines.len() > MAX_LINES {
        return Err(ServiceError::validation(format!("Order can contain at most {} lines", MAX_LINES)));
    }
    if let Some(line) = lines.iter().find(|l| !(1..=MAX_QUANTITY).contains(&l.quantity)) {
        return Err(ServiceError::validation(format!(
            "Quantity for item {} must be between 1 and {}",
            line.menu_item_id, MAX_QUANTITY
        )));
    }
    Ok(())
}

/// Snapshot names and prices from `menu`; every line must reference an
/// available item. Returns the priced lines and their total.
pub fn price_lines(lines: &[OrderLine], menu: &[MenuItem]) -> ServiceResult<(Vec<PricedLine>, Decimal)> {
    let mut priced = Vec::with_capacity(lines.len());
    let mut total = Decimal::ZERO;
    for line in lines {
        let item = menu
            .iter()
            .find(|m| m.id == line.menu_item_id && m.is_available)
            .ok_or_else(|| ServiceError::validation(format!("Menu item {} is not available", line.menu_item_id)))?;
        total += item.price * Decimal::from(line.quantity);
        priced.push(PricedLine {
            menu_item_id: item.id,
            name: item.name.clone(),
            unit_price: item.price,
            quantity: line.quantity,
        });
    }
    Ok((priced, total))
}

/// Transfer orders still awaiting payment after the window are expired.
pub fn is_payment_overdue(order: &Order, now: DateTime<Utc>, window: Duration) -> bool {
    order.payment_method() == Some(PaymentMethod::Transfer)
        && !order.payment_confirmed
        && matches!(order.status(), Ok(OrderStatus::Pending | OrderStatus::PendingPayment))
        && order.created_at + window < now
}

/// Staff transition. Without enforcement any known status is accepted.
pub fn plan_transition(current: OrderStatus, next: OrderStatus, enforce: bool) -> Result<OrderStatus, TransitionError> {
    if enforce {
        current.transition(next)
    } else {
        Ok(next)
    }
}

pub(crate) fn payment_window() -> Duration {
    Duration::minutes(config::config().orders.payment_window_minutes)
}

async fn items_for(conn: &mut PgConnection, order_id: Uuid) -> ServiceResult<Vec<OrderItem>> {
    Ok(sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, menu_item_id, name, unit_price, quantity FROM order_items WHERE order_id = $1 ORDER BY name",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?)
}

async fn lock_order(conn: &mut PgConnection, venue_id: Uuid, id: Uuid) -> ServiceResult<Order> {
    let sql = format!("SELECT {} FROM orders WHERE venue_id = $1 AND id = $2 FOR UPDATE", ORDER_COLUMNS);
    sqlx::query_as::<_, Order>(&sql)
        .bind(venue_id)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(ServiceError::NotFound("Order"))
}

async fn set_status(conn: &mut PgConnection, id: Uuid, status: OrderStatus) -> ServiceResult<Order> {
    let sql = format!(
        "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
        ORDER_COLUMNS
    );
    Ok(sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .bind(status.as_str())
        .fetch_one(&mut *conn)
        .await?)
}

/// Expire a locked transfer order whose payment window has passed.
pub(crate) async fn expire_if_overdue(conn: &mut PgConnection, order: Order) -> ServiceResult<Order> {
    if !is_payment_overdue(&order, Utc::now(), payment_window()) {
        return Ok(order);
    }
    let order = set_status(conn, order.id, OrderStatus::Expired).await?;
    tracing::info!("Order {} expired awaiting transfer", order.id);
    Ok(order)
}

/// Load a guest's order by id and guest token, locked for update. A wrong
/// token reads as a missing order.
pub(crate) async fn lock_guest_order(conn: &mut PgConnection, id: Uuid, guest_token: &str) -> ServiceResult<Order> {
    let sql = format!("SELECT {} FROM orders WHERE id = $1 FOR UPDATE", ORDER_COLUMNS);
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .filter(|o| !guest_token.is_empty() && o.guest_token == guest_token)
        .ok_or(ServiceError::NotFound("Order"))?;

    let (suspended,): (bool,) = sqlx::query_as("SELECT suspended FROM venues WHERE id = $1")
        .bind(order.venue_id)
        .fetch_one(&mut *conn)
        .await?;
    if suspended {
        return Err(AccessError::VenueSuspended.into());
    }
    Ok(order)
}

pub struct OrderService {
    pool: PgPool,
}

impl OrderService {
    pub async fn new() -> ServiceResult<Self> {
        let pool = DatabaseManager::main_pool().await?;
        Ok(Self { pool })
    }

    /// Guest submission from a table QR code.
    pub async fn create_guest_order(&self, qr_token: &str, input: CreateOrder) -> ServiceResult<GuestOrderCreated> {
        validate_lines(&input.items)?;
        let note = optional_text("Note", input.note.as_deref(), MAX_NOTE_LEN)?;

        let (table, venue) = table_for_guest(&self.pool, qr_token).await?;
        rate_limit::check_and_record(&self.pool, RateScope::OrderSubmit, qr_token).await?;

        let ids: Vec<Uuid> = input.items.iter().map(|l| l.menu_item_id).collect();
        let menu = sqlx::query_as::<_, MenuItem>(
            r#"
            SELECT id, venue_id, category_id, name, description, price, is_available, image_path, sort_order, created_at
            FROM menu_items
            WHERE venue_id = $1 AND id = ANY($2)
            "#,
        )
        .bind(venue.id)
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        let (lines, total) = price_lines(&input.items, &menu)?;

        let guest_token = tokens::random_token(GUEST_TOKEN_LEN);
        let status = OrderStatus::initial(input.payment_method);

        let mut tx = self.pool.begin().await?;
        let sql = format!(
            r#"
            INSERT INTO orders (id, venue_id, table_id, status, payment_method, total, guest_note, guest_token)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(Uuid::new_v4())
            .bind(venue.id)
            .bind(table.id)
            .bind(status.as_str())
            .bind(input.payment_method.as_str())
            .bind(total)
            .bind(&note)
            .bind(&guest_token)
            .fetch_one(&mut *tx)
            .await?;

        for line in &lines {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, menu_item_id, name, unit_price, quantity) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(order.id)
            .bind(line.menu_item_id)
            .bind(&line.name)
            .bind(line.unit_price)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }
        let items = items_for(&mut tx, order.id).await?;
        tx.commit().await?;

        tracing::info!(
            "Order {} placed at {} table {} ({}, total {})",
            order.id,
            venue.slug,
            table.label,
            status,
            total
        );
        let can_cancel = status.is_awaiting_confirmation();
        Ok(GuestOrderCreated { order: GuestOrder { order, items, can_cancel }, guest_token })
    }

    /// Guest polling. Overdue transfer orders are expired on read.
    pub async fn guest_order(&self, id: Uuid, guest_token: &str) -> ServiceResult<GuestOrder> {
        let mut tx = self.pool.begin().await?;
        let order = lock_guest_order(&mut tx, id, guest_token).await?;
        let order = expire_if_overdue(&mut tx, order).await?;
        let items = items_for(&mut tx, order.id).await?;
        tx.commit().await?;

        let can_cancel = order.status().map(|s| s.is_awaiting_confirmation()).unwrap_or(false);
        Ok(GuestOrder { order, items, can_cancel })
    }

    pub async fn guest_cancel(&self, id: Uuid, guest_token: &str) -> ServiceResult<GuestOrder> {
        let mut tx = self.pool.begin().await?;
        let order = lock_guest_order(&mut tx, id, guest_token).await?;
        let next = order.status()?.guest_cancel()?;
        let order = set_status(&mut tx, order.id, next).await?;
        let items = items_for(&mut tx, order.id).await?;
        tx.commit().await?;

        tracing::info!("Order {} cancelled by guest", order.id);
        Ok(GuestOrder { order, items, can_cancel: false })
    }

    /// Staff listing, newest first. Expires overdue transfer orders first.
    pub async fn list_orders(&self, venue_id: Uuid, filter: OrderFilter) -> ServiceResult<Vec<OrderSummary>> {
        let status = filter.status.as_deref().map(OrderStatus::parse).transpose()?;
        let (limit, offset) = page(filter.limit, filter.offset);

        let expired = sqlx::query(
            r#"
            UPDATE orders SET status = 'expired', updated_at = NOW()
            WHERE venue_id = $1
              AND payment_method = 'transfer'
              AND NOT payment_confirmed
              AND status IN ('pending', 'pending_payment')
              AND created_at < $2
            "#,
        )
        .bind(venue_id)
        .bind(Utc::now() - payment_window())
        .execute(&self.pool)
        .await?
        .rows_affected();
        if expired > 0 {
            tracing::info!("Expired {} overdue transfer orders in venue {}", expired, venue_id);
        }

        let sql = format!(
            r#"
            SELECT {} FROM orders
            WHERE venue_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR table_id = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
            ORDER_COLUMNS
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(venue_id)
            .bind(status.map(|s| s.as_str()))
            .bind(filter.table_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders
            .into_iter()
            .map(|order| {
                let next_actions = order.status().map(|s| s.next_actions()).unwrap_or(&[]);
                OrderSummary { order, next_actions }
            })
            .collect())
    }

    async fn detail(&self, conn: &mut PgConnection, order: Order) -> ServiceResult<OrderDetail> {
        let items = items_for(conn, order.id).await?;
        let claims = sqlx::query_as::<_, PaymentClaim>(
            "SELECT id, order_id, venue_id, reference, amount, proof_path, submitted_at FROM payment_claims WHERE order_id = $1 ORDER BY submitted_at",
        )
        .bind(order.id)
        .fetch_all(&mut *conn)
        .await?;
        let confirmation = sqlx::query_as::<_, PaymentConfirmation>(
            "SELECT id, order_id, venue_id, confirmed_by, note, confirmed_at FROM payment_confirmations WHERE order_id = $1",
        )
        .bind(order.id)
        .fetch_optional(&mut *conn)
        .await?;
        let next_actions = order.status().map(|s| s.next_actions()).unwrap_or(&[]);
        Ok(OrderDetail { order, items, claims, confirmation, next_actions })
    }

    pub async fn get_order(&self, venue_id: Uuid, id: Uuid) -> ServiceResult<OrderDetail> {
        let mut tx = self.pool.begin().await?;
        let order = lock_order(&mut tx, venue_id, id).await?;
        let order = expire_if_overdue(&mut tx, order).await?;
        let detail = self.detail(&mut tx, order).await?;
        tx.commit().await?;
        Ok(detail)
    }

    pub async fn update_status(&self, actor: &Actor, venue_id: Uuid, id: Uuid, status: &str) -> ServiceResult<OrderDetail> {
        let next = OrderStatus::parse(status)?;
        let enforce = config::config().orders.enforce_transitions;

        let mut tx = self.pool.begin().await?;
        let order = lock_order(&mut tx, venue_id, id).await?;
        let current = order.status()?;
        let next = plan_transition(current, next, enforce)?;
        let order = set_status(&mut tx, order.id, next).await?;

        let event = AuditEvent::new(actor, AuditAction::UpdateOrderStatus, TargetType::Order)
            .target(order.id)
            .details(json!({ "from": current, "to": next, "enforced": enforce }));
        audit::record(&mut tx, &event).await?;
        let detail = self.detail(&mut tx, order).await?;
        tx.commit().await?;

        tracing::info!("Order {} moved {} -> {}", id, current, next);
        Ok(detail)
    }

    /// Record that the venue received payment. Awaiting transfer orders move
    /// to confirmed; live cash orders only get the flag.
    pub async fn confirm_payment(
        &self,
        actor: &Actor,
        venue_id: Uuid,
        id: Uuid,
        note: Option<String>,
    ) -> ServiceResult<OrderDetail> {
        let note = optional_text("Note", note.as_deref(), MAX_NOTE_LEN)?;

        let mut tx = self.pool.begin().await?;
        let order = lock_order(&mut tx, venue_id, id).await?;
        if order.payment_confirmed {
            return Err(ServiceError::Conflict("Payment is already confirmed".to_string()));
        }
        let current = order.status()?;
        let next = current.after_payment_confirmed()?;

        sqlx::query(
            "INSERT INTO payment_confirmations (id, order_id, venue_id, confirmed_by, note) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(order.id)
        .bind(venue_id)
        .bind(actor.user_id)
        .bind(&note)
        .execute(&mut *tx)
        .await?;

        let sql = format!(
            "UPDATE orders SET payment_confirmed = TRUE, status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            ORDER_COLUMNS
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order.id)
            .bind(next.as_str())
            .fetch_one(&mut *tx)
            .await?;

        let event = AuditEvent::new(actor, AuditAction::ConfirmPayment, TargetType::Order)
            .target(order.id)
            .details(json!({ "from": current, "to": next, "amount": order.total, "note": note }));
        audit::record(&mut tx, &event).await?;
        let detail = self.detail(&mut tx, order).await?;
        tx.commit().await?;

        Ok(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn menu_item(price: &str, available: bool) -> MenuItem {
        MenuItem {
            id: Uuid::new_v4(),
            venue_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            name: "Flat white".into(),
            description: String::new(),
            price: Decimal::from_str(price).unwrap(),
            is_available: available,
            image_path: None,
            sort_order: 0,
            created_at: Utc::now(),
        }
    }

    fn order(method: PaymentMethod, status: OrderStatus, age_minutes: i64) -> Order {
        Order {
            id: Uuid::new_v4(),
            venue_id: Uuid::new_v4(),
            table_id: Uuid::new_v4(),
            status: status.as_str().into(),
            payment_method: method.as_str().into(),
            payment_confirmed: false,
            total: Decimal::ZERO,
            guest_note: None,
            guest_token: "t".into(),
            created_at: Utc::now() - Duration::minutes(age_minutes),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn quantities_are_bounded() {
        let id = Uuid::new_v4();
        assert!(validate_lines(&[OrderLine { menu_item_id: id, quantity: 1 }]).is_ok());
        assert!(validate_lines(&[OrderLine { menu_item_id: id, quantity: 99 }]).is_ok());
        assert!(validate_lines(&[OrderLine { menu_item_id: id, quantity: 0 }]).is_err());
        assert!(validate_lines(&[OrderLine { menu_item_id: id, quantity: 100 }]).is_err());
        assert!(validate_lines(&[]).is_err());
    }

    #[test]
    fn prices_are_snapshotted_and_summed() {
        let coffee = menu_item("3.50", true);
        let cake = menu_item("4.25", true);
        let lines = vec![
            OrderLine { menu_item_id: coffee.id, quantity: 2 },
            OrderLine { menu_item_id: cake.id, quantity: 1 },
        ];
        let (priced, total) = price_lines(&lines, &[coffee.clone(), cake]).unwrap();
        assert_eq!(total, Decimal::from_str("11.25").unwrap());
        assert_eq!(priced[0].unit_price, coffee.price);
        assert_eq!(priced[0].name, "Flat white");
    }

    #[test]
    fn unavailable_or_unknown_items_are_rejected() {
        let sold_out = menu_item("2.00", false);
        let lines = vec![OrderLine { menu_item_id: sold_out.id, quantity: 1 }];
        assert!(price_lines(&lines, &[sold_out]).is_err());
        let lines = vec![OrderLine { menu_item_id: Uuid::new_v4(), quantity: 1 }];
        assert!(price_lines(&lines, &[]).is_err());
    }

    #[test]
    fn only_stale_unpaid_transfers_are_overdue() {
        let window = Duration::minutes(30);
        let now = Utc::now();
        assert!(is_payment_overdue(&order(PaymentMethod::Transfer, OrderStatus::PendingPayment, 31), now, window));
        assert!(!is_payment_overdue(&order(PaymentMethod::Transfer, OrderStatus::PendingPayment, 5), now, window));
        assert!(!is_payment_overdue(&order(PaymentMethod::Cash, OrderStatus::CashOnDelivery, 120), now, window));
        assert!(!is_payment_overdue(&order(PaymentMethod::Transfer, OrderStatus::Confirmed, 120), now, window));

        let mut paid = order(PaymentMethod::Transfer, OrderStatus::PendingPayment, 120);
        paid.payment_confirmed = true;
        assert!(!is_payment_overdue(&paid, now, window));
    }

    #[test]
    fn transitions_follow_enforcement_switch() {
        assert!(plan_transition(OrderStatus::Ready, OrderStatus::Preparing, true).is_err());
        assert_eq!(plan_transition(OrderStatus::Ready, OrderStatus::Preparing, false), Ok(OrderStatus::Preparing));
        assert_eq!(
            plan_transition(OrderStatus::CashOnDelivery, OrderStatus::Confirmed, true),
            Ok(OrderStatus::Confirmed)
        );
    }
}
