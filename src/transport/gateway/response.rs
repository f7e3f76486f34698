use crate::access::DenyReason;
use crate::store::StoreError;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

/// Failures surfaced by the JSON endpoints, rendered as
/// `{"ok": false, "error": ..}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Too many failed attempts. Try again in {retry_after}s.")]
    TooManyAttempts { retry_after: u64 },

    #[error("Service unavailable")]
    Unavailable(#[from] StoreError),

    #[error("Internal error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            // The data API answers unauthenticated requests with 403; only
            // the page path redirects to the login form.
            Self::Forbidden(_) | Self::Unauthenticated => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::TooManyAttempts { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DenyReason> for ApiError {
    fn from(reason: DenyReason) -> Self {
        if reason.is_not_found() {
            Self::NotFound(reason.to_string())
        } else {
            Self::Forbidden(reason.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Unavailable(err) => tracing::error!(error = %err, "store unavailable"),
            Self::Internal(detail) => tracing::error!(detail = %detail, "internal gateway error"),
            _ => {}
        }
        let status = self.status();
        let body = serde_json::json!({"ok": false, "error": self.to_string()});
        let mut response = (status, Json(body)).into_response();
        if let Self::TooManyAttempts { retry_after } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }
        response
    }
}
