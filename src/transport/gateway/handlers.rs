use super::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};

/// GET / - service index
pub(super) async fn handle_index() -> impl IntoResponse {
    Json(serde_json::json!({
        "ok": true,
        "service": "reportgate",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /health",
            "push_data": "POST /push-data (X-API-KEY required)",
            "report_login": "GET|POST /report/{client_id}/login",
            "report_page": "GET /report/{client_id}",
            "report_logout": "GET /report/{client_id}/logout",
            "report_api": "GET /api/report/{client_id}",
        },
    }))
}

/// GET /health - store liveness
pub(super) async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.clients.health_check().await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"ok": true}))),
        Err(error) => {
            tracing::warn!(%error, backend = state.store.backend_name(), "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"ok": false, "error": error.to_string()})),
            )
        }
    }
}
