// handlers/protected/orders.rs - Staff order queue

use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::access::Capability;
use crate::middleware::{ApiResponse, ApiResult, RequestContext};
use crate::services::order_service::{OrderDetail, OrderFilter, OrderService, OrderSummary};

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub note: Option<String>,
}

/// GET /api/orders?status=...&table_id=...&limit=...&offset=...
///
/// Newest first. Transfer orders past the payment window are expired before
/// the page is read.
pub async fn order_list(
    Extension(ctx): Extension<RequestContext>,
    Query(filter): Query<OrderFilter>,
) -> ApiResult<Vec<OrderSummary>> {
    ctx.require(Capability::ViewOrders)?;
    let venue_id = ctx.venue()?;
    let service = OrderService::new().await?;
    Ok(ApiResponse::success(service.list_orders(venue_id, filter).await?))
}

/// GET /api/orders/:id - Items, payment claims, confirmation and next actions
pub async fn order_show(Extension(ctx): Extension<RequestContext>, Path(id): Path<Uuid>) -> ApiResult<OrderDetail> {
    ctx.require(Capability::ViewOrders)?;
    let venue_id = ctx.venue()?;
    let service = OrderService::new().await?;
    Ok(ApiResponse::success(service.get_order(venue_id, id).await?))
}

/// POST /api/orders/:id/status
///
/// Expected Input:
/// ```json
/// { "status": "preparing" }
/// ```
///
/// Moves not offered in `next_actions` are rejected with 422
/// INVALID_TRANSITION unless transition enforcement is switched off.
pub async fn order_status(
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> ApiResult<OrderDetail> {
    ctx.require(Capability::ManageOrders)?;
    let venue_id = ctx.venue()?;
    let service = OrderService::new().await?;
    Ok(ApiResponse::success(
        service.update_status(&ctx.actor(), venue_id, id, &payload.status).await?,
    ))
}

/// POST /api/orders/:id/confirm-payment
///
/// Expected Input:
/// ```json
/// { "note": "Seen on statement" }  // Optional
/// ```
pub async fn order_confirm_payment(
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    payload: Option<Json<ConfirmPaymentRequest>>,
) -> ApiResult<OrderDetail> {
    ctx.require(Capability::ConfirmPayments)?;
    let venue_id = ctx.venue()?;
    let note = payload.and_then(|Json(body)| body.note);
    let service = OrderService::new().await?;
    Ok(ApiResponse::success(service.confirm_payment(&ctx.actor(), venue_id, id, note).await?))
}
