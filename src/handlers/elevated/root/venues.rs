// handlers/elevated/root/venues.rs - Venue (tenant) lifecycle

use axum::{extract::Path, Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::access::Capability;
use crate::database::models::{FeatureFlag, Venue};
use crate::middleware::{ApiResponse, ApiResult, RequestContext};
use crate::services::feature_service::FeatureService;
use crate::services::venue_service::{CreateVenue, UpdateVenue, VenueCreated, VenueService};

#[derive(Debug, Deserialize)]
pub struct FeatureRequest {
    pub enabled: bool,
}

/// GET /api/root/venues
pub async fn venue_list(Extension(ctx): Extension<RequestContext>) -> ApiResult<Vec<Venue>> {
    ctx.require(Capability::ManageTenants)?;
    let service = VenueService::new().await?;
    Ok(ApiResponse::success(service.list_venues().await?))
}

/// GET /api/root/venues/:id
pub async fn venue_show(Extension(ctx): Extension<RequestContext>, Path(id): Path<Uuid>) -> ApiResult<Venue> {
    ctx.require(Capability::ManageTenants)?;
    let service = VenueService::new().await?;
    Ok(ApiResponse::success(service.get_venue(id).await?))
}

/// POST /api/root/venues - Create a venue, optionally with its first admin
///
/// Expected Input:
/// ```json
/// {
///   "name": "Harbour Cafe",
///   "slug": "harbour-cafe",     // [a-z0-9-], 2-64 chars, unique
///   "admin": {                  // Optional
///     "email": "owner@harbour.test",
///     "full_name": "Ada Owner",
///     "password": "..."
///   }
/// }
/// ```
pub async fn venue_create(
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<CreateVenue>,
) -> ApiResult<VenueCreated> {
    ctx.require(Capability::ManageTenants)?;
    let service = VenueService::new().await?;
    Ok(ApiResponse::created(service.create_venue(&ctx.actor(), payload).await?))
}

/// PATCH /api/root/venues/:id - Rename, re-slug, suspend or reinstate
///
/// Expected Input (all optional):
/// ```json
/// { "name": "...", "slug": "...", "suspended": true }
/// ```
pub async fn venue_update(
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateVenue>,
) -> ApiResult<Venue> {
    ctx.require(Capability::ManageTenants)?;
    let service = VenueService::new().await?;
    Ok(ApiResponse::success(service.update_venue(&ctx.actor(), id, payload).await?))
}

/// GET /api/root/venues/:id/features
pub async fn feature_list(Extension(ctx): Extension<RequestContext>, Path(id): Path<Uuid>) -> ApiResult<Vec<FeatureFlag>> {
    ctx.require(Capability::ManageFeatureFlags)?;
    let service = FeatureService::new().await?;
    Ok(ApiResponse::success(service.list(id).await?))
}

/// PUT /api/root/venues/:id/features/:key
///
/// Expected Input:
/// ```json
/// { "enabled": true }
/// ```
pub async fn feature_set(
    Extension(ctx): Extension<RequestContext>,
    Path((id, key)): Path<(Uuid, String)>,
    Json(payload): Json<FeatureRequest>,
) -> ApiResult<FeatureFlag> {
    ctx.require(Capability::ManageFeatureFlags)?;
    let service = FeatureService::new().await?;
    Ok(ApiResponse::success(service.set(&ctx.actor(), id, &key, payload.enabled).await?))
}
