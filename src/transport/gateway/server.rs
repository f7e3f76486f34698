use super::handlers::{handle_health, handle_index};
use super::push::handle_push;
use super::report::{
    handle_login_page, handle_login_submit, handle_logout, handle_report_api, handle_report_page,
};
use super::session::SessionGuard;
use super::AppState;

use crate::access::{AccessPolicy, AccessWindowController, Clock};
use crate::config::Config;
use crate::render::ReportRenderer;
use crate::store::StoreHandle;
use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Returns true when the bind address is not a loopback address.
fn is_public_bind(host: &str) -> bool {
    !matches!(
        host,
        "127.0.0.1" | "localhost" | "::1" | "[::1]" | "0:0:0:0:0:0:0:1"
    )
}

/// Wire the controller, renderer and session guard around an opened store.
pub fn build_state(
    config: Arc<Config>,
    store: StoreHandle,
    clock: Arc<dyn Clock>,
) -> crate::Result<AppState> {
    let controller = Arc::new(AccessWindowController::new(
        Arc::clone(&store.clients),
        AccessPolicy::from(&config.access),
        clock,
    ));
    let renderer = Arc::new(ReportRenderer::new()?);
    let sessions = Arc::new(SessionGuard::new(config.gateway.session_ttl_secs));

    Ok(AppState {
        config,
        store,
        controller,
        renderer,
        sessions,
    })
}

/// Bind `host:port` and serve until Ctrl-C.
pub async fn run_gateway(host: &str, port: u16, state: AppState) -> Result<()> {
    if is_public_bind(host) && !state.config.gateway.allow_public_bind {
        anyhow::bail!(
            "Refusing to bind to {host}: the gateway would be exposed beyond this machine.\n\
             Fix: use --host 127.0.0.1 (default), put a reverse proxy in front, or set\n\
             [gateway] allow_public_bind = true in config.toml."
        );
    }

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("parse gateway bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind gateway socket")?;

    run_gateway_with_listener(host, listener, state).await
}

/// Run the HTTP gateway from a pre-bound listener.
pub async fn run_gateway_with_listener(
    host: &str,
    listener: tokio::net::TcpListener,
    state: AppState,
) -> Result<()> {
    let actual_port = listener
        .local_addr()
        .context("get gateway listener local address")?
        .port();
    let display_addr = format!("{host}:{actual_port}");

    print_gateway_banner(&display_addr, &state);
    tracing::info!(
        addr = %display_addr,
        backend = state.store.backend_name(),
        "gateway started"
    );

    let app = build_app(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve HTTP gateway")?;

    tracing::info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "failed to listen for Ctrl-C; shutdown only by kill");
        std::future::pending::<()>().await;
    }
}

fn print_gateway_banner(display_addr: &str, state: &AppState) {
    let policy = state.controller.policy();
    println!("Report gateway listening on {display_addr}");
    println!("  POST /push-data");
    println!("  GET  /report/{{client_id}}/login");
    println!("  GET  /report/{{client_id}}");
    println!("  GET  /api/report/{{client_id}}");
    println!("  GET  /health");
    println!(
        "  Trial: {} days, {} windows of {}h",
        policy.trial_days, policy.max_views, policy.window_hours
    );
    println!("  Storage: {}", state.store.backend_name());
    if !state.config.push_enabled() {
        println!("  Push disabled: api_key is not configured");
    }
}

pub fn build_app(state: AppState) -> Router {
    let max_body_bytes = state.config.gateway.max_body_bytes;
    let timeout = Duration::from_secs(state.config.gateway.request_timeout_secs);

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/push-data", post(handle_push))
        .route(
            "/report/{client_id}/login",
            get(handle_login_page).post(handle_login_submit),
        )
        .route("/report/{client_id}/logout", get(handle_logout))
        .route("/report/{client_id}", get(handle_report_page))
        .route("/api/report/{client_id}", get(handle_report_api))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
}
