// handlers/protected/menu.rs - /api/menu/* handlers
//
// Reads are open to any venue member; writes need `can_manage_menu`.

use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::access::Capability;
use crate::database::models::{Category, MenuItem};
use crate::middleware::{ApiResponse, ApiResult, RequestContext};
use crate::services::menu_service::{CategoryInput, CategoryPatch, MenuItemInput, MenuItemPatch, MenuService};

#[derive(Debug, Deserialize)]
pub struct ItemQuery {
    pub category_id: Option<Uuid>,
}

/// GET /api/menu/categories
pub async fn category_list(Extension(ctx): Extension<RequestContext>) -> ApiResult<Vec<Category>> {
    let venue_id = ctx.venue()?;
    let service = MenuService::new().await?;
    Ok(ApiResponse::success(service.list_categories(venue_id).await?))
}

/// GET /api/menu/categories/:id
pub async fn category_show(Extension(ctx): Extension<RequestContext>, Path(id): Path<Uuid>) -> ApiResult<Category> {
    let venue_id = ctx.venue()?;
    let service = MenuService::new().await?;
    Ok(ApiResponse::success(service.get_category(venue_id, id).await?))
}

/// POST /api/menu/categories
///
/// Expected Input:
/// ```json
/// { "name": "Coffee", "sort_order": 1, "is_active": true }
/// ```
pub async fn category_create(
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<CategoryInput>,
) -> ApiResult<Category> {
    ctx.require(Capability::ManageMenu)?;
    let venue_id = ctx.venue()?;
    let service = MenuService::new().await?;
    Ok(ApiResponse::created(service.create_category(&ctx.actor(), venue_id, payload).await?))
}

/// PATCH /api/menu/categories/:id
pub async fn category_update(
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryPatch>,
) -> ApiResult<Category> {
    ctx.require(Capability::ManageMenu)?;
    let venue_id = ctx.venue()?;
    let service = MenuService::new().await?;
    Ok(ApiResponse::success(service.update_category(&ctx.actor(), venue_id, id, payload).await?))
}

/// DELETE /api/menu/categories/:id - Removes the category and its items
pub async fn category_delete(Extension(ctx): Extension<RequestContext>, Path(id): Path<Uuid>) -> ApiResult<Value> {
    ctx.require(Capability::ManageMenu)?;
    let venue_id = ctx.venue()?;
    let service = MenuService::new().await?;
    service.delete_category(&ctx.actor(), venue_id, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

/// GET /api/menu/items?category_id=...
pub async fn item_list(
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<ItemQuery>,
) -> ApiResult<Vec<MenuItem>> {
    let venue_id = ctx.venue()?;
    let service = MenuService::new().await?;
    Ok(ApiResponse::success(service.list_items(venue_id, query.category_id).await?))
}

/// GET /api/menu/items/:id
pub async fn item_show(Extension(ctx): Extension<RequestContext>, Path(id): Path<Uuid>) -> ApiResult<MenuItem> {
    let venue_id = ctx.venue()?;
    let service = MenuService::new().await?;
    Ok(ApiResponse::success(service.get_item(venue_id, id).await?))
}

/// POST /api/menu/items
///
/// Expected Input:
/// ```json
/// {
///   "category_id": "uuid",
///   "name": "Flat white",
///   "description": "Double shot",             // Optional
///   "price": "3.50",
///   "is_available": true,                     // Optional
///   "image_path": "venues/<id>/menu/fw.jpg",  // Optional, must be under the venue
///   "sort_order": 0                           // Optional
/// }
/// ```
pub async fn item_create(
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<MenuItemInput>,
) -> ApiResult<MenuItem> {
    ctx.require(Capability::ManageMenu)?;
    let venue_id = ctx.venue()?;
    let service = MenuService::new().await?;
    Ok(ApiResponse::created(service.create_item(&ctx.actor(), venue_id, payload).await?))
}

/// PATCH /api/menu/items/:id
pub async fn item_update(
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MenuItemPatch>,
) -> ApiResult<MenuItem> {
    ctx.require(Capability::ManageMenu)?;
    let venue_id = ctx.venue()?;
    let service = MenuService::new().await?;
    Ok(ApiResponse::success(service.update_item(&ctx.actor(), venue_id, id, payload).await?))
}

/// DELETE /api/menu/items/:id
pub async fn item_delete(Extension(ctx): Extension<RequestContext>, Path(id): Path<Uuid>) -> ApiResult<Value> {
    ctx.require(Capability::ManageMenu)?;
    let venue_id = ctx.venue()?;
    let service = MenuService::new().await?;
    service.delete_item(&ctx.actor(), venue_id, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}
