// handlers/protected/mod.rs - Protected handlers (JWT + session required)
//
// Venue dashboard API for tenant-admins and staff, and for super-admins
// while impersonating a venue. Handlers receive the validated
// `RequestContext` and check one capability each before calling a service.
//
// Security Level: JWT Authentication + live session validation
// Route Prefix: /api/*
// Middleware: jwt_auth → validate_session

use axum::{
    routing::{get, patch, post},
    Router,
};

pub mod menu;
pub mod orders;
pub mod session;
pub mod tables;
pub mod users;
pub mod venue;

pub fn routes() -> Router {
    Router::new()
        .route("/api/auth/whoami", get(session::whoami))
        // Menu
        .route("/api/menu/categories", get(menu::category_list).post(menu::category_create))
        .route(
            "/api/menu/categories/:id",
            get(menu::category_show).patch(menu::category_update).delete(menu::category_delete),
        )
        .route("/api/menu/items", get(menu::item_list).post(menu::item_create))
        .route(
            "/api/menu/items/:id",
            get(menu::item_show).patch(menu::item_update).delete(menu::item_delete),
        )
        // Tables
        .route("/api/tables", get(tables::table_list).post(tables::table_create))
        .route(
            "/api/tables/:id",
            get(tables::table_show).patch(tables::table_update).delete(tables::table_delete),
        )
        .route("/api/tables/:id/rotate-qr", post(tables::table_rotate_qr))
        // Orders
        .route("/api/orders", get(orders::order_list))
        .route("/api/orders/:id", get(orders::order_show))
        .route("/api/orders/:id/status", post(orders::order_status))
        .route("/api/orders/:id/confirm-payment", post(orders::order_confirm_payment))
        // Users
        .route("/api/users", get(users::user_list).post(users::user_create))
        .route("/api/users/:id", patch(users::user_update).delete(users::user_delete))
        .route("/api/users/:id/archive", post(users::user_archive))
        .route("/api/users/:id/password", post(users::user_password))
        .route("/api/invitations", post(users::invitation_create))
        // Venue settings
        .route("/api/bank-details", get(venue::bank_details_show).put(venue::bank_details_update))
        .route("/api/storage/signed-url", post(venue::signed_url_create))
        .route("/api/audit", get(venue::audit_list))
        .route("/api/features", get(venue::feature_list))
}
