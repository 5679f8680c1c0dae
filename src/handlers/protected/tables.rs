use axum::{extract::Path, Extension, Json};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::access::Capability;
use crate::database::models::DiningTable;
use crate::middleware::{ApiResponse, ApiResult, RequestContext};
use crate::services::table_service::{TableInput, TablePatch, TableService};

/// GET /api/tables
pub async fn table_list(Extension(ctx): Extension<RequestContext>) -> ApiResult<Vec<DiningTable>> {
    let venue_id = ctx.venue()?;
    let service = TableService::new().await?;
    Ok(ApiResponse::success(service.list(venue_id).await?))
}

/// GET /api/tables/:id
pub async fn table_show(Extension(ctx): Extension<RequestContext>, Path(id): Path<Uuid>) -> ApiResult<DiningTable> {
    let venue_id = ctx.venue()?;
    let service = TableService::new().await?;
    Ok(ApiResponse::success(service.get(venue_id, id).await?))
}

/// POST /api/tables - Create a table with a fresh QR token
///
/// Expected Input:
/// ```json
/// { "label": "Terrace 4" }
/// ```
pub async fn table_create(
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<TableInput>,
) -> ApiResult<DiningTable> {
    ctx.require(Capability::ManageTables)?;
    let venue_id = ctx.venue()?;
    let service = TableService::new().await?;
    Ok(ApiResponse::created(service.create(&ctx.actor(), venue_id, payload).await?))
}

/// PATCH /api/tables/:id
pub async fn table_update(
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TablePatch>,
) -> ApiResult<DiningTable> {
    ctx.require(Capability::ManageTables)?;
    let venue_id = ctx.venue()?;
    let service = TableService::new().await?;
    Ok(ApiResponse::success(service.update(&ctx.actor(), venue_id, id, payload).await?))
}

/// DELETE /api/tables/:id
pub async fn table_delete(Extension(ctx): Extension<RequestContext>, Path(id): Path<Uuid>) -> ApiResult<Value> {
    ctx.require(Capability::ManageTables)?;
    let venue_id = ctx.venue()?;
    let service = TableService::new().await?;
    service.delete(&ctx.actor(), venue_id, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

/// POST /api/tables/:id/rotate-qr - Invalidate the printed QR code
pub async fn table_rotate_qr(Extension(ctx): Extension<RequestContext>, Path(id): Path<Uuid>) -> ApiResult<DiningTable> {
    ctx.require(Capability::ManageTables)?;
    let venue_id = ctx.venue()?;
    let service = TableService::new().await?;
    Ok(ApiResponse::success(service.rotate_qr(&ctx.actor(), venue_id, id).await?))
}
