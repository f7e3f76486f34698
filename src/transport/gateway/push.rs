//! `POST /push-data`: producers upload the latest report for a client.

use super::credentials::{constant_time_eq, hash_password};
use super::paths::report_path;
use super::response::ApiError;
use super::AppState;
use crate::store::{Attachment, PushRecord, ReportPayload};
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Fields consumed by the push itself and never stored in the document.
const TRANSPORT_FIELDS: [&str; 3] = ["password", "excel_filename", "excel_b64"];

fn check_api_key(configured: &str, headers: &HeaderMap) -> Result<(), ApiError> {
    let configured = configured.trim();
    if configured.is_empty() {
        return Err(ApiError::Forbidden("API key not configured".into()));
    }
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if constant_time_eq(presented, configured) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Unauthorized".into()))
    }
}

fn client_id_of(body: &Map<String, Value>) -> Option<String> {
    let raw = match body.get("client_id")? {
        Value::String(id) => id.trim().to_string(),
        Value::Number(id) => id.to_string(),
        _ => return None,
    };
    (!raw.is_empty()).then_some(raw)
}

fn optional_text<'a>(body: &'a Map<String, Value>, field: &str) -> Result<Option<&'a str>, ApiError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.is_empty() => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(_) => Err(ApiError::BadRequest(format!("{field} must be a string"))),
    }
}

fn attachment_of(body: &Map<String, Value>) -> Result<Option<Attachment>, ApiError> {
    let filename = optional_text(body, "excel_filename")?;
    let content = optional_text(body, "excel_b64")?;
    match (filename, content) {
        (None, None) => Ok(None),
        (Some(filename), Some(content)) => {
            base64::engine::general_purpose::STANDARD
                .decode(content.trim())
                .map_err(|_| ApiError::BadRequest("excel_b64 is not valid base64".into()))?;
            Ok(Some(Attachment {
                filename: filename.to_string(),
                content_b64: content.trim().to_string(),
            }))
        }
        _ => Err(ApiError::BadRequest(
            "excel_filename and excel_b64 must be sent together".into(),
        )),
    }
}

/// Validate a push body and turn it into the record the store applies.
pub fn parse_push_body(body: Value, now: DateTime<Utc>) -> Result<PushRecord, ApiError> {
    let Value::Object(mut body) = body else {
        return Err(ApiError::BadRequest("Body must be a JSON object".into()));
    };

    let client_id =
        client_id_of(&body).ok_or_else(|| ApiError::BadRequest("client_id required".into()))?;
    if !body.get("data").is_some_and(Value::is_object) {
        return Err(ApiError::BadRequest("data must be an object".into()));
    }

    let password_hash = optional_text(&body, "password")?.map(hash_password);
    let attachment = attachment_of(&body)?;

    for field in TRANSPORT_FIELDS {
        body.remove(field);
    }
    body.insert("client_id".into(), Value::String(client_id.clone()));

    Ok(PushRecord {
        client_id,
        received_at: now,
        password_hash,
        payload: ReportPayload::new(Value::Object(body), attachment, now),
    })
}

/// POST /push-data
pub(super) async fn handle_push(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    check_api_key(&state.config.api_key, &headers).inspect_err(|_| {
        tracing::warn!("push rejected: missing or wrong API key");
    })?;

    let body: Value = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("Invalid JSON payload".into()))?;
    let push = parse_push_body(body, state.controller.now())?;
    let credential_updated = push.password_hash.is_some();
    let has_attachment = push.payload.attachment.is_some();

    let record = state.store.payloads.record_push(push).await?;
    tracing::info!(
        client_id = %record.client_id,
        credential_updated,
        has_attachment,
        views_used = record.views_used,
        "report pushed"
    );

    Ok(Json(serde_json::json!({
        "ok": true,
        "public_path": report_path(&record.client_id),
    })))
}
