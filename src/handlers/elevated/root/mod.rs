// handlers/elevated/root/mod.rs - /api/root/* routes

use axum::{
    routing::{get, post, put},
    Router,
};

pub mod impersonate;
pub mod venues;

pub fn routes() -> Router {
    Router::new()
        .route("/api/root/venues", get(venues::venue_list).post(venues::venue_create))
        .route("/api/root/venues/:id", get(venues::venue_show).patch(venues::venue_update))
        .route("/api/root/venues/:id/features", get(venues::feature_list))
        .route("/api/root/venues/:id/features/:key", put(venues::feature_set))
        .route(
            "/api/root/impersonate",
            post(impersonate::impersonate_start).delete(impersonate::impersonate_stop),
        )
}
