use crate::gateway_harness::GatewayTestServer;
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
async fn index_and_health_respond() {
    let server = GatewayTestServer::start().await;

    let index: Value = server.get("/", None).await.json().await.unwrap();
    assert_eq!(index["ok"], true);
    assert_eq!(index["endpoints"]["report_api"], "GET /api/report/{client_id}");

    let health = server.get("/health", None).await;
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(health.json::<Value>().await.unwrap(), json!({"ok": true}));
}

#[tokio::test]
async fn oversized_push_is_rejected() {
    let server =
        GatewayTestServer::start_with(|config| config.gateway.max_body_bytes = 1024).await;
    let filler = "x".repeat(4096);
    let response = server
        .push(json!({"client_id": "BIG", "data": {"filler": filler}}))
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(server.store.client_count(), 0);
}

#[tokio::test]
async fn session_cookie_is_http_only_and_lax() {
    let server = GatewayTestServer::start_with(|config| {
        config.gateway.cookie_secure = true;
        config.gateway.session_ttl_secs = 600;
    })
    .await;
    server
        .push(json!({"client_id": "ACME", "data": {}, "password": "pw"}))
        .await;

    let login = server.login("ACME", "pw").await;
    let cookie = login.headers()[reqwest::header::SET_COOKIE]
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("report_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Max-Age=600"));
    assert!(cookie.contains("Secure"));
}

#[tokio::test]
async fn percent_encoded_client_ids_round_trip() {
    let server = GatewayTestServer::start().await;
    let response = server
        .push(json!({"client_id": "Smith & Sons", "data": {}}))
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["public_path"], "/report/Smith%20%26%20Sons");

    let page = server.get("/report/Smith%20%26%20Sons", None).await;
    assert_eq!(page.status(), StatusCode::OK);
}
