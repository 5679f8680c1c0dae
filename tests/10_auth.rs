mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/health")).send().await?;

    // OK with a reachable database, SERVICE_UNAVAILABLE without one
    assert!(
        res.status() == StatusCode::OK || res.status() == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status: {}",
        res.status()
    );

    let body = res.json::<serde_json::Value>().await?;
    assert!(body["data"]["status"].is_string(), "missing status: {}", body);
    Ok(())
}

#[tokio::test]
async fn protected_routes_reject_missing_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    for path in ["/api/auth/whoami", "/api/orders", "/api/menu/items", "/api/root/venues"] {
        let res = client.get(server.url(path)).send().await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "path {}", path);
        let body = res.json::<serde_json::Value>().await?;
        common::assert_error_envelope(&body);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }
    Ok(())
}

#[tokio::test]
async fn tokens_signed_with_another_secret_are_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let forged = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &serde_json::json!({
            "sub": "00000000-0000-4000-8000-000000000002",
            "email": "mallory@tableside.test",
            "role": "super_admin",
            "venue": null,
            "impersonating": null,
            "iat": 0,
            "exp": 4_102_444_800i64,
        }),
        &jsonwebtoken::EncodingKey::from_secret(b"not-the-server-secret"),
    )?;

    let res = client.get(server.url("/api/root/venues")).bearer_auth(forged).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn root_routes_require_super_admin_claim() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    for role in ["staff", "tenant_admin"] {
        let token = common::mint_token(Some(role), Some("00000000-0000-4000-8000-0000000000aa"))?;
        let res = client.get(server.url("/api/root/venues")).bearer_auth(&token).send().await?;
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "role {}", role);
        let body = res.json::<serde_json::Value>().await?;
        common::assert_error_envelope(&body);
    }
    Ok(())
}

#[tokio::test]
async fn unknown_subject_fails_session_validation() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let token = common::mint_token(Some("super_admin"), None)?;
    let res = client.get(server.url("/api/auth/whoami")).bearer_auth(&token).send().await?;

    // No such profile (401), or no database to look it up in (503)
    assert!(
        res.status() == StatusCode::UNAUTHORIZED || res.status() == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status: {}",
        res.status()
    );
    let body = res.json::<serde_json::Value>().await?;
    common::assert_error_envelope(&body);
    Ok(())
}
