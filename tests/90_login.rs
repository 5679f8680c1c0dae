mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn login_with_unknown_user_fails_cleanly() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": "nobody@tableside.test", "password": "wrong-password-123" }))
        .send()
        .await?;

    assert!(
        res.status() == StatusCode::UNAUTHORIZED || res.status() == StatusCode::SERVICE_UNAVAILABLE,
        "expected UNAUTHORIZED or SERVICE_UNAVAILABLE, got {}",
        res.status()
    );

    let body = res.json::<serde_json::Value>().await?;
    common::assert_error_envelope(&body);
    Ok(())
}

#[tokio::test]
async fn login_without_body_is_a_client_error() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.post(server.url("/auth/login")).send().await?;
    assert!(res.status().is_client_error(), "expected client error, got {}", res.status());
    Ok(())
}

#[tokio::test]
async fn password_reset_does_not_reveal_accounts() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/auth/password-reset/request"))
        .json(&json!({ "email": "ghost@tableside.test" }))
        .send()
        .await?;

    if res.status() == StatusCode::SERVICE_UNAVAILABLE {
        return Ok(());
    }
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], true);
    assert!(body["data"].get("reset_token").is_none(), "no token for unknown email: {}", body);
    Ok(())
}

#[tokio::test]
async fn reset_confirm_rejects_unknown_tokens() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/auth/password-reset/confirm"))
        .json(&json!({ "token": "definitely-not-issued", "new_password": "another-password-42" }))
        .send()
        .await?;

    assert!(res.status().is_client_error() || res.status() == StatusCode::SERVICE_UNAVAILABLE);
    let body = res.json::<serde_json::Value>().await?;
    common::assert_error_envelope(&body);
    Ok(())
}
