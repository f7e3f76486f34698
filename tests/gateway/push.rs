use crate::gateway_harness::{API_KEY, GatewayTestServer, session_token};
use reportgate::store::{ClientStore, PayloadStore};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
async fn first_push_creates_fresh_client_and_keeps_payload() {
    let server = GatewayTestServer::start().await;

    let response = server
        .push(json!({"client_id": "RELAIS", "year": 2025, "data": {"revenue": [1, 2, 3]}}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("push response should be json");
    assert_eq!(body, json!({"ok": true, "public_path": "/report/RELAIS"}));

    let record = server
        .store
        .get("RELAIS")
        .await
        .unwrap()
        .expect("push should create the client");
    assert_eq!(record.views_used, 0);
    assert_eq!(record.window_expires_at, None);
    assert_eq!(record.trial_start, crate::gateway_harness::t0());

    let payload = server.store.get_payload("RELAIS").await.unwrap().unwrap();
    assert_eq!(payload.data(), json!({"revenue": [1, 2, 3]}));
    assert_eq!(payload.document["year"], 2025);
}

#[tokio::test]
async fn push_requires_matching_api_key() {
    let server = GatewayTestServer::start().await;

    let missing = server
        .client()
        .post(server.url("/push-data"))
        .json(&json!({"client_id": "A", "data": {}}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::FORBIDDEN);

    let wrong = server
        .client()
        .post(server.url("/push-data"))
        .header("X-API-KEY", format!("{API_KEY}-wrong"))
        .json(&json!({"client_id": "A", "data": {}}))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);
    let body: Value = wrong.json().await.unwrap();
    assert_eq!(body["ok"], false);
    assert_eq!(server.store.client_count(), 0);
}

#[tokio::test]
async fn push_is_refused_when_no_key_is_configured() {
    let server = GatewayTestServer::start_with(|config| config.api_key.clear()).await;
    let response = server
        .client()
        .post(server.url("/push-data"))
        .header("X-API-KEY", "")
        .json(&json!({"client_id": "A", "data": {}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "API key not configured");
}

#[tokio::test]
async fn malformed_pushes_are_bad_requests() {
    let server = GatewayTestServer::start().await;
    for (body, error) in [
        (json!({"data": {}}), "client_id required"),
        (json!({"client_id": "A", "data": [1]}), "data must be an object"),
        (
            json!({"client_id": "A", "data": {}, "excel_b64": "AAAA"}),
            "excel_filename and excel_b64 must be sent together",
        ),
    ] {
        let response = server.push(body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: Value = response.json().await.unwrap();
        assert_eq!(json["error"], error);
    }
    assert_eq!(server.store.client_count(), 0);
}

#[tokio::test]
async fn credential_survives_pushes_without_password() {
    let server = GatewayTestServer::start().await;
    server
        .push(json!({"client_id": "ACME", "data": {"v": 1}, "password": "first"}))
        .await;
    server.push(json!({"client_id": "ACME", "data": {"v": 2}})).await;

    let rejected = server.login("ACME", "second").await;
    assert_eq!(rejected.status(), StatusCode::FORBIDDEN);
    assert!(session_token(&rejected).is_none());
    let accepted = server.login("ACME", "first").await;
    assert_eq!(accepted.status(), StatusCode::SEE_OTHER);

    server
        .push(json!({"client_id": "ACME", "data": {"v": 3}, "password": "second"}))
        .await;
    assert_eq!(
        server.login("ACME", "first").await.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        server.login("ACME", "second").await.status(),
        StatusCode::SEE_OTHER
    );

    let payload = server.store.get_payload("ACME").await.unwrap().unwrap();
    assert_eq!(payload.data(), json!({"v": 3}));
    assert!(payload.document.get("password").is_none());
}

#[tokio::test]
async fn repeated_push_never_resets_the_trial() {
    let server = GatewayTestServer::start().await;
    server.push(json!({"client_id": "ACME", "data": {}})).await;
    let page = server.get("/report/ACME", None).await;
    assert_eq!(page.status(), StatusCode::OK);

    server
        .clock
        .advance(chrono::Duration::hours(2));
    server.push(json!({"client_id": "ACME", "data": {"new": true}})).await;

    let record = server.store.get("ACME").await.unwrap().unwrap();
    assert_eq!(record.trial_start, crate::gateway_harness::t0());
    assert_eq!(record.views_used, 1);
}
