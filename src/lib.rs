pub mod access;
pub mod audit;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod orders;
pub mod services;
pub mod storage;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode},
    middleware::from_fn,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::database::manager::DatabaseManager;
use crate::middleware::{jwt_auth_middleware, require_super_admin_middleware, validate_session_middleware};

/// Full HTTP surface with every tier's middleware attached.
pub fn app() -> Router {
    let config = config::config();

    // Layers run outermost-last: jwt_auth executes before validate_session.
    let protected = handlers::protected::routes()
        .layer(from_fn(validate_session_middleware))
        .layer(from_fn(jwt_auth_middleware));

    let elevated = handlers::elevated::routes()
        .layer(from_fn(validate_session_middleware))
        .layer(from_fn(require_super_admin_middleware))
        .layer(from_fn(jwt_auth_middleware));

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(handlers::public::routes())
        // Protected API
        .merge(protected)
        // Super-admin API
        .merge(elevated)
        // Global middleware
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(cors_layer(&config.security.cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// Permissive when no origins (or `*`) are configured.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    CorsLayer::permissive().allow_origin(AllowOrigin::list(allowed))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Tableside API",
            "version": version,
            "description": "Multi-tenant QR table ordering backend",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "guest": "/public/tables/:qr_token/*, /public/orders/:id/* (public, QR or guest token)",
                "auth": "/auth/login, /auth/password-reset/*, /auth/invitations/accept (public)",
                "venue": "/api/* (protected - venue staff and admins)",
                "root": "/api/root/* (restricted - super-admins)",
            }
        }
    }))
}

async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database_error": e.to_string()
                    }
                })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn root_describes_the_api() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let response = app()
            .oneshot(Request::builder().uri("/api/orders").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn root_routes_reject_garbage_tokens() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/root/venues")
                    .header("Authorization", "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn staff_tokens_cannot_reach_root_routes() {
        let claims = auth::Claims::new(
            uuid::Uuid::new_v4(),
            "barista@cafe.test".to_string(),
            Some(access::Role::Staff),
            Some(uuid::Uuid::new_v4()),
        );
        let token = auth::generate_jwt(&claims).unwrap();
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/root/venues")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn explicit_origins_build_a_list() {
        // Must not panic on a mix of valid and invalid origins.
        let _ = cors_layer(&["https://dash.example.com".to_string(), "bad\norigin".to_string()]);
        let _ = cors_layer(&[]);
    }
}
