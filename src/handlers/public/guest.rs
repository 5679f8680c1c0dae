// handlers/public/guest.rs - Guest ordering by table QR code
//
// The QR token identifies the table (and so the venue). After submitting an
// order the guest holds a guest token, required for every follow-up call.

use axum::{
    extract::{Path, Query},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::PaymentClaim;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::menu_service::{MenuService, TableMenu};
use crate::services::order_service::{CreateOrder, GuestOrder, GuestOrderCreated, OrderService};
use crate::services::payment_service::{PaymentClaimInput, PaymentService, TransferInstructions};

#[derive(Debug, Deserialize)]
pub struct GuestTokenQuery {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct GuestTokenBody {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentClaimBody {
    pub token: String,
    pub reference: String,
    pub amount: Decimal,
    pub proof_path: Option<String>,
}

/// GET /public/tables/:qr_token/menu - Active categories and available items
pub async fn table_menu(Path(qr_token): Path<String>) -> ApiResult<TableMenu> {
    let service = MenuService::new().await?;
    Ok(ApiResponse::success(service.menu_for_table(&qr_token).await?))
}

/// POST /public/tables/:qr_token/orders - Place an order
///
/// Expected Input:
/// ```json
/// {
///   "payment_method": "cash",  // or "transfer"
///   "items": [{ "menu_item_id": "uuid", "quantity": 2 }],
///   "note": "no sugar"         // Optional
/// }
/// ```
///
/// Prices are taken from the menu at submission time. The response carries
/// the `guest_token` the guest needs to poll, cancel or pay.
pub async fn order_create(Path(qr_token): Path<String>, Json(payload): Json<CreateOrder>) -> ApiResult<GuestOrderCreated> {
    let service = OrderService::new().await?;
    let created = service.create_guest_order(&qr_token, payload).await?;
    Ok(ApiResponse::created(created))
}

/// GET /public/orders/:id?token=... - Poll an order
pub async fn order_show(Path(id): Path<Uuid>, Query(query): Query<GuestTokenQuery>) -> ApiResult<GuestOrder> {
    let service = OrderService::new().await?;
    Ok(ApiResponse::success(service.guest_order(id, &query.token).await?))
}

/// POST /public/orders/:id/cancel - Withdraw an order the venue has not accepted
pub async fn order_cancel(Path(id): Path<Uuid>, Json(payload): Json<GuestTokenBody>) -> ApiResult<GuestOrder> {
    let service = OrderService::new().await?;
    Ok(ApiResponse::success(service.guest_cancel(id, &payload.token).await?))
}

/// POST /public/orders/:id/payment-claim - Report a bank transfer
///
/// Expected Input:
/// ```json
/// {
///   "token": "guest token",
///   "reference": "TBL-7 Smith",
///   "amount": "12.50",
///   "proof_path": "venues/<venue_id>/proofs/receipt.jpg"  // Optional
/// }
/// ```
pub async fn payment_claim(Path(id): Path<Uuid>, Json(payload): Json<PaymentClaimBody>) -> ApiResult<PaymentClaim> {
    let service = PaymentService::new().await?;
    let input = PaymentClaimInput {
        reference: payload.reference,
        amount: payload.amount,
        proof_path: payload.proof_path,
    };
    let claim = service.submit_claim(id, &payload.token, input).await?;
    Ok(ApiResponse::created(claim))
}

/// GET /public/orders/:id/bank-details?token=... - Where to send a transfer
pub async fn bank_details(Path(id): Path<Uuid>, Query(query): Query<GuestTokenQuery>) -> ApiResult<TransferInstructions> {
    let service = PaymentService::new().await?;
    Ok(ApiResponse::success(service.transfer_instructions(id, &query.token).await?))
}
