// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Guest ordering from a table QR code and the token acquisition flows.
// Every input here is untrusted: guests prove access with a QR token or a
// per-order guest token, staff with their credentials.
//
// Security Level: None
// Route Prefix: /public/*, /auth/*
// Middleware: None

use axum::{
    routing::{get, post},
    Router,
};

pub mod auth; // Login, password reset, invitations
pub mod guest; // Menu, orders and payments by QR / guest token

pub fn routes() -> Router {
    Router::new()
        .route("/public/tables/:qr_token/menu", get(guest::table_menu))
        .route("/public/tables/:qr_token/orders", post(guest::order_create))
        .route("/public/orders/:id", get(guest::order_show))
        .route("/public/orders/:id/cancel", post(guest::order_cancel))
        .route("/public/orders/:id/payment-claim", post(guest::payment_claim))
        .route("/public/orders/:id/bank-details", get(guest::bank_details))
        .route("/auth/login", post(auth::login))
        .route("/auth/password-reset/request", post(auth::password_reset_request))
        .route("/auth/password-reset/confirm", post(auth::password_reset_confirm))
        .route("/auth/invitations/accept", post(auth::invitation_accept))
}
