//! Viewer-facing routes: login, report shell page, logout and the data API.

use super::credentials::verify_password;
use super::paths::{api_path, login_path, logout_path, report_path};
use super::response::ApiError;
use super::session::{session_cookie, session_token};
use super::AppState;
use crate::access::{DenyReason, Outcome};
use crate::render::{ErrorView, LoginView, ReportView};
use crate::store::{ClientRecord, encode_timestamp};
use axum::{
    Form,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Json, Redirect, Response},
};
use serde::Deserialize;
use serde_json::Value;

const NO_DATA: &str = "No data available. Please contact provider.";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub password: String,
}

fn html(status: StatusCode, body: String) -> Response {
    (status, Html(body)).into_response()
}

/// Render a page-path failure as an HTML error page.
fn error_page(state: &AppState, client_id: &str, err: &ApiError) -> Response {
    let status = err.status();
    match err {
        ApiError::Unavailable(source) => tracing::error!(client_id, error = %source, "store unavailable"),
        ApiError::Internal(detail) => tracing::error!(client_id, detail = %detail, "page failed"),
        _ => {}
    }
    let message = err.to_string();
    let view = ErrorView {
        status: status.as_u16(),
        message: &message,
    };
    match state.renderer.error_page(&view) {
        Ok(body) => html(status, body),
        Err(render_err) => {
            tracing::error!(error = %render_err, "error page failed to render");
            (status, message).into_response()
        }
    }
}

fn login_form(
    state: &AppState,
    status: StatusCode,
    client_id: &str,
    error: Option<&str>,
) -> Result<Response, ApiError> {
    let path = login_path(client_id);
    let body = state
        .renderer
        .login_page(&LoginView {
            client_id,
            login_path: &path,
            error,
        })
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(html(status, body))
}

fn unlocked(state: &AppState, headers: &HeaderMap, record: &ClientRecord) -> bool {
    !record.requires_password()
        || state
            .sessions
            .is_authorized(session_token(headers), &record.client_id)
}

/// GET /report/{client_id}/login
pub(super) async fn handle_login_page(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Response {
    let client_id = client_id.trim();
    login_form(&state, StatusCode::OK, client_id, None)
        .unwrap_or_else(|err| error_page(&state, client_id, &err))
}

/// POST /report/{client_id}/login
pub(super) async fn handle_login_submit(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let client_id = client_id.trim();
    login_submit(&state, client_id, &headers, &form.password)
        .await
        .unwrap_or_else(|err| error_page(&state, client_id, &err))
}

async fn login_submit(
    state: &AppState,
    client_id: &str,
    headers: &HeaderMap,
    password: &str,
) -> Result<Response, ApiError> {
    if let Err(retry_after) = state.sessions.check_lockout(client_id) {
        tracing::warn!(client_id, retry_after, "login locked out");
        let message = ApiError::TooManyAttempts { retry_after }.to_string();
        let mut response =
            login_form(state, StatusCode::TOO_MANY_REQUESTS, client_id, Some(&message))?;
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        return Ok(response);
    }

    let Some(record) = state.store.clients.get(client_id).await? else {
        return login_form(state, StatusCode::NOT_FOUND, client_id, Some("Client not found"));
    };

    let accepted = match record.password_hash.as_deref() {
        Some(hash) if !hash.is_empty() => verify_password(password, hash),
        _ => true,
    };
    if !accepted {
        state.sessions.record_failure(client_id);
        tracing::warn!(client_id, "login rejected: incorrect password");
        return login_form(state, StatusCode::FORBIDDEN, client_id, Some("Incorrect password"));
    }

    state.sessions.clear_failures(client_id);
    let token = state.sessions.authorize(session_token(headers), client_id);
    let cookie = session_cookie(
        &token,
        state.sessions.ttl_secs(),
        state.config.gateway.cookie_secure,
    );
    tracing::info!(client_id, "viewer signed in");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Redirect::to(&report_path(client_id)),
    )
        .into_response())
}

/// GET /report/{client_id}/logout
pub(super) async fn handle_logout(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
) -> Redirect {
    let client_id = client_id.trim();
    state.sessions.revoke(session_token(&headers), client_id);
    tracing::debug!(client_id, "viewer signed out");
    Redirect::to(&login_path(client_id))
}

/// GET /report/{client_id}: the shell page. Opening it may start a new
/// access window.
pub(super) async fn handle_report_page(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let client_id = client_id.trim();
    report_page(&state, client_id, &headers)
        .await
        .unwrap_or_else(|err| error_page(&state, client_id, &err))
}

async fn report_page(
    state: &AppState,
    client_id: &str,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let Some(record) = state.store.clients.get(client_id).await? else {
        return Err(DenyReason::NoSuchClient.into());
    };
    if !unlocked(state, headers, &record) {
        return Ok(Redirect::to(&login_path(client_id)).into_response());
    }
    let Some(payload) = state.store.payloads.get_payload(client_id).await? else {
        return Err(ApiError::NotFound(NO_DATA.into()));
    };

    let record = match state.controller.evaluate(client_id).await? {
        Outcome::Admitted(record) => record,
        Outcome::Denied(reason) => return Err(reason.into()),
    };

    let year = payload.year_label();
    let api = api_path(client_id);
    let logout = logout_path(client_id);
    let body = state
        .renderer
        .report_page(&ReportView {
            client_id,
            year: &year,
            window_expires_at: record
                .window_expires_at
                .map(encode_timestamp)
                .unwrap_or_default(),
            views_used: record.views_used,
            max_views: state.controller.policy().max_views,
            api_path: &api,
            logout_path: &logout,
        })
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(html(StatusCode::OK, body))
}

/// GET /api/report/{client_id}: report data. Never opens a window.
pub(super) async fn handle_report_api(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let client_id = client_id.trim();
    let Some(record) = state.store.clients.get(client_id).await? else {
        return Err(DenyReason::NoSuchClient.into());
    };
    if !unlocked(&state, &headers, &record) {
        return Err(ApiError::Unauthenticated);
    }

    let record = match state.controller.check_window(client_id).await? {
        Outcome::Admitted(record) => record,
        Outcome::Denied(reason) => return Err(reason.into()),
    };
    let Some(payload) = state.store.payloads.get_payload(client_id).await? else {
        return Err(ApiError::NotFound(NO_DATA.into()));
    };

    let mut body = serde_json::json!({
        "client": client_id,
        "year": payload.document.get("year").cloned().unwrap_or_else(|| Value::String(String::new())),
        "updated_at": payload.updated_at.format("%d/%m/%Y %H:%M UTC").to_string(),
        "trial": {
            "valid_until": record.window_expires_at.map(encode_timestamp).unwrap_or_default(),
            "views_used": record.views_used,
            "views_max": state.controller.policy().max_views,
        },
        "data": payload.data(),
    });
    if let (Some(attachment), Some(map)) = (payload.attachment, body.as_object_mut()) {
        map.insert("excel_filename".into(), Value::String(attachment.filename));
        map.insert("excel_b64".into(), Value::String(attachment.content_b64));
    }
    Ok(Json(body))
}
