mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn unknown_qr_code_has_no_menu() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/public/tables/no-such-qr-token/menu")).send().await?;
    assert!(
        res.status() == StatusCode::NOT_FOUND || res.status() == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status: {}",
        res.status()
    );
    let body = res.json::<serde_json::Value>().await?;
    common::assert_error_envelope(&body);
    Ok(())
}

#[tokio::test]
async fn guest_order_lookup_needs_the_guest_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/public/orders/00000000-0000-4000-8000-00000000beef?token=guess"))
        .send()
        .await?;
    assert!(
        res.status() == StatusCode::NOT_FOUND || res.status() == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status: {}",
        res.status()
    );
    Ok(())
}

#[tokio::test]
async fn order_with_unknown_payment_method_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/public/tables/no-such-qr-token/orders"))
        .json(&json!({
            "payment_method": "barter",
            "items": [{ "menu_item_id": "00000000-0000-4000-8000-000000000010", "quantity": 1 }]
        }))
        .send()
        .await?;
    assert!(res.status().is_client_error(), "expected client error, got {}", res.status());
    Ok(())
}

#[tokio::test]
async fn empty_order_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/public/tables/no-such-qr-token/orders"))
        .json(&json!({ "payment_method": "cash", "items": [] }))
        .send()
        .await?;
    assert!(
        res.status() == StatusCode::BAD_REQUEST || res.status() == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status: {}",
        res.status()
    );
    let body = res.json::<serde_json::Value>().await?;
    common::assert_error_envelope(&body);
    Ok(())
}
