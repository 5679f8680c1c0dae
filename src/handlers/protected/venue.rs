// handlers/protected/venue.rs - Bank details, storage grants, audit log, flags

use axum::{extract::Query, Extension, Json};
use serde::Deserialize;

use crate::access::Capability;
use crate::audit::AuditEntry;
use crate::database::models::{BankDetails, FeatureFlag};
use crate::middleware::{ApiResponse, ApiResult, RequestContext};
use crate::services::audit_service::{AuditQuery, AuditService};
use crate::services::feature_service::FeatureService;
use crate::services::payment_service::{BankDetailsInput, PaymentService};
use crate::services::storage_service::StorageService;
use crate::storage::SignedUrl;

#[derive(Debug, Deserialize)]
pub struct SignedUrlRequest {
    pub path: String,
}

/// GET /api/bank-details
pub async fn bank_details_show(Extension(ctx): Extension<RequestContext>) -> ApiResult<BankDetails> {
    ctx.require(Capability::ManageBankDetails)?;
    let venue_id = ctx.venue()?;
    let service = PaymentService::new().await?;
    Ok(ApiResponse::success(service.get_bank_details(venue_id).await?))
}

/// PUT /api/bank-details - Create or replace the venue's transfer account
///
/// Expected Input:
/// ```json
/// {
///   "account_holder": "Cafe Ltd",
///   "bank_name": "First Bank",
///   "account_number": "GB00 0000 0000 0000",
///   "reference_hint": "Use your table number"  // Optional
/// }
/// ```
pub async fn bank_details_update(
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<BankDetailsInput>,
) -> ApiResult<BankDetails> {
    ctx.require(Capability::ManageBankDetails)?;
    let venue_id = ctx.venue()?;
    let service = PaymentService::new().await?;
    Ok(ApiResponse::success(service.upsert_bank_details(&ctx.actor(), venue_id, payload).await?))
}

/// POST /api/storage/signed-url - Time-limited read grant for a blob
///
/// Expected Input:
/// ```json
/// { "path": "venues/<venue_id>/proofs/receipt.jpg" }
/// ```
///
/// Tenant sessions can only sign paths under their own venue prefix.
pub async fn signed_url_create(
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<SignedUrlRequest>,
) -> ApiResult<SignedUrl> {
    ctx.require(Capability::ViewOrders)?;
    let service = StorageService::new().await?;
    Ok(ApiResponse::created(service.issue_signed_url(&ctx.actor(), &payload.path).await?))
}

/// GET /api/audit?action=...&actor_id=...&venue_id=...&limit=...&offset=...
///
/// Tenant sessions only see their venue; `venue_id` applies to platform
/// sessions.
pub async fn audit_list(
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Vec<AuditEntry>> {
    ctx.require(Capability::ViewAuditLog)?;
    let service = AuditService::new().await?;
    Ok(ApiResponse::success(service.list(&ctx.scope, query).await?))
}

/// GET /api/features - Flags set for the active venue
pub async fn feature_list(Extension(ctx): Extension<RequestContext>) -> ApiResult<Vec<FeatureFlag>> {
    let venue_id = ctx.venue()?;
    let service = FeatureService::new().await?;
    Ok(ApiResponse::success(service.list(venue_id).await?))
}
