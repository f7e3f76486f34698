use crate::gateway_harness::{GatewayTestServer, session_token, t0};
use chrono::Duration;
use reportgate::store::ClientStore;
use reqwest::StatusCode;
use reqwest::header::LOCATION;
use serde_json::{Value, json};

async fn api(server: &GatewayTestServer, client_id: &str, session: Option<&str>) -> (StatusCode, Value) {
    let response = server
        .get(&format!("/api/report/{client_id}"), session)
        .await;
    let status = response.status();
    let body = response.json().await.expect("api responses are json");
    (status, body)
}

#[tokio::test]
async fn fresh_client_walkthrough_over_http() {
    let server = GatewayTestServer::start().await;
    server
        .push(json!({"client_id": "ACME", "year": "2025", "data": {"kpi": 7}}))
        .await;

    let (status, body) = api(&server, "ACME", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Access window expired");

    let page = server.get("/report/ACME", None).await;
    assert_eq!(page.status(), StatusCode::OK);
    assert!(page.text().await.unwrap().contains("view 1 of 3"));

    let (status, body) = api(&server, "ACME", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["client"], "ACME");
    assert_eq!(body["year"], "2025");
    assert_eq!(body["data"], json!({"kpi": 7}));
    assert_eq!(body["trial"]["views_used"], 1);
    assert_eq!(body["trial"]["valid_until"], "2026-07-02T09:00:00.000000Z");

    server.clock.set(t0() + Duration::hours(1));
    assert_eq!(server.get("/report/ACME", None).await.status(), StatusCode::OK);
    assert_eq!(server.store.get("ACME").await.unwrap().unwrap().views_used, 1);

    server.clock.set(t0() + Duration::hours(25));
    let (status, _) = api(&server, "ACME", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "the API never renews");
    assert_eq!(server.get("/report/ACME", None).await.status(), StatusCode::OK);
    let record = server.store.get("ACME").await.unwrap().unwrap();
    assert_eq!(record.views_used, 2);
    assert_eq!(record.window_expires_at, Some(t0() + Duration::hours(49)));

    server.clock.set(t0() + Duration::hours(50));
    assert_eq!(server.get("/report/ACME", None).await.status(), StatusCode::OK);

    server.clock.set(t0() + Duration::hours(50 + 24) + Duration::seconds(1));
    let denied = server.get("/report/ACME", None).await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    assert!(denied.text().await.unwrap().contains("Trial ended"));
}

#[tokio::test]
async fn limit_reached_inside_trial() {
    let server = GatewayTestServer::start_with(|config| config.access.html_valid_hours = 1).await;
    server.push(json!({"client_id": "ACME", "data": {}})).await;

    for hour in 0..3 {
        server.clock.set(t0() + Duration::hours(hour * 2));
        assert_eq!(server.get("/report/ACME", None).await.status(), StatusCode::OK);
    }
    server.clock.set(t0() + Duration::hours(6));
    let denied = server.get("/report/ACME", None).await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    assert!(denied.text().await.unwrap().contains("Trial limit reached"));
    assert_eq!(server.store.get("ACME").await.unwrap().unwrap().views_used, 3);
}

#[tokio::test]
async fn password_protected_login_then_fetch() {
    let server = GatewayTestServer::start().await;
    server
        .push(json!({"client_id": "ACME", "data": {"secret": 1}, "password": "open sesame"}))
        .await;

    let redirect = server.get("/report/ACME", None).await;
    assert_eq!(redirect.status(), StatusCode::SEE_OTHER);
    assert_eq!(redirect.headers()[LOCATION], "/report/ACME/login");
    let (status, body) = api(&server, "ACME", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Not authenticated");

    let wrong = server.login("ACME", "open says me").await;
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);
    assert!(session_token(&wrong).is_none());
    assert!(wrong.text().await.unwrap().contains("Incorrect password"));

    let login = server.login("ACME", "open sesame").await;
    assert_eq!(login.status(), StatusCode::SEE_OTHER);
    assert_eq!(login.headers()[LOCATION], "/report/ACME");
    let token = session_token(&login).expect("successful login sets the session cookie");

    let page = server.get("/report/ACME", Some(&token)).await;
    assert_eq!(page.status(), StatusCode::OK);
    let (status, body) = api(&server, "ACME", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"secret": 1}));

    let logout = server.get("/report/ACME/logout", Some(&token)).await;
    assert_eq!(logout.status(), StatusCode::SEE_OTHER);
    let (status, _) = api(&server, "ACME", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn session_for_one_client_does_not_unlock_another() {
    let server = GatewayTestServer::start().await;
    server
        .push(json!({"client_id": "ACME", "data": {}, "password": "a"}))
        .await;
    server
        .push(json!({"client_id": "GLOBEX", "data": {}, "password": "g"}))
        .await;

    let token = session_token(&server.login("ACME", "a").await).unwrap();
    let other = server.get("/report/GLOBEX", Some(&token)).await;
    assert_eq!(other.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn unknown_client_is_not_found() {
    let server = GatewayTestServer::start().await;
    assert_eq!(
        server.get("/report/NOBODY", None).await.status(),
        StatusCode::NOT_FOUND
    );
    let (status, _) = api(&server, "NOBODY", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let login = server.login("NOBODY", "x").await;
    assert_eq!(login.status(), StatusCode::NOT_FOUND);
    assert!(login.text().await.unwrap().contains("Client not found"));
    assert_eq!(server.store.client_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_page_loads_renew_once() {
    let server = GatewayTestServer::start().await;
    server.push(json!({"client_id": "ACME", "data": {}})).await;

    let url = server.url("/report/ACME");
    let mut handles = Vec::new();
    for _ in 0..25 {
        let client = server.client().clone();
        let url = url.clone();
        handles.push(tokio::spawn(async move {
            client.get(url).send().await.unwrap().status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }
    assert_eq!(server.store.get("ACME").await.unwrap().unwrap().views_used, 1);
}
