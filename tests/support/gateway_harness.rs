#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use tempfile::TempDir;

use reportgate::access::ManualClock;
use reportgate::config::{Config, StorageBackend};
use reportgate::store::{InMemoryReportStore, StoreHandle};
use reportgate::transport::gateway::{build_state, run_gateway_with_listener};

pub const API_KEY: &str = "producer-test-key";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap()
}

pub struct GatewayTestServer {
    port: u16,
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemoryReportStore>,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
    _workspace: TempDir,
}

impl GatewayTestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    #[allow(clippy::field_reassign_with_default)]
    pub async fn start_with(tweak: impl FnOnce(&mut Config)) -> Self {
        let workspace = TempDir::new().expect("temp workspace should be created");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("ephemeral gateway listener should bind");
        let port = listener
            .local_addr()
            .expect("ephemeral gateway listener should expose local address")
            .port();

        let mut config = Config::default();
        config.data_dir = workspace.path().to_path_buf();
        config.config_path = workspace.path().join("config.toml");
        config.api_key = API_KEY.to_string();
        config.storage.backend = StorageBackend::Memory;
        tweak(&mut config);

        let clock = Arc::new(ManualClock::new(t0()));
        let store = Arc::new(InMemoryReportStore::new());
        let state = build_state(
            Arc::new(config),
            StoreHandle::new(Arc::clone(&store)),
            clock.clone(),
        )
        .expect("gateway state should build");

        let host = "127.0.0.1".to_string();
        let handle =
            tokio::spawn(async move { run_gateway_with_listener(&host, listener, state).await });

        wait_until_gateway_ready(port).await;

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("reqwest client should be built");

        Self {
            port,
            clock,
            store,
            client,
            handle,
            _workspace: workspace,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub async fn push(&self, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url("/push-data"))
            .header("X-API-KEY", API_KEY)
            .json(&body)
            .send()
            .await
            .expect("push request should complete")
    }

    /// Submit the login form; returns the response (redirect or login page).
    pub async fn login(&self, client_id: &str, password: &str) -> reqwest::Response {
        let form = format!(
            "password={}",
            utf8_percent_encode(password, NON_ALPHANUMERIC)
        );
        self.client
            .post(self.url(&format!("/report/{client_id}/login")))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(form)
            .send()
            .await
            .expect("login request should complete")
    }

    pub async fn get(&self, path: &str, session: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = session {
            request = request.header(COOKIE, format!("report_session={token}"));
        }
        request.send().await.expect("GET should complete")
    }
}

impl Drop for GatewayTestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// The session token from a login response's `Set-Cookie` header.
pub fn session_token(response: &reqwest::Response) -> Option<String> {
    let cookie = response.headers().get(SET_COOKIE)?.to_str().ok()?;
    cookie
        .split(';')
        .next()?
        .strip_prefix("report_session=")
        .map(ToString::to_string)
}

async fn wait_until_gateway_ready(port: u16) {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .expect("reqwest client should be built");

    for _ in 0..80 {
        let health = client
            .get(format!("http://127.0.0.1:{port}/health"))
            .send()
            .await;
        if matches!(health, Ok(resp) if resp.status() == StatusCode::OK) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("gateway did not become ready on port {port}");
}
