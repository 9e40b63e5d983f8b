//! JSON error bodies and the no-store response helper shared by the routes.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::{MonitorError, StatusError};

// ---

const NO_STORE: &str = "no-store, max-age=0";

/// Seconds.
const RETRY_AFTER_SECS: &str = "300";

/// Wraps a response so caches never keep a status view.
pub fn no_store(body: impl IntoResponse) -> Response {
    // ---
    let mut resp = body.into_response();
    resp.headers_mut().insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
    resp
}

/// Serializes `value` as JSON with the no-store header.
pub fn no_store_json<T: Serialize>(value: T) -> Response {
    no_store(Json(value))
}

#[derive(Debug)]
pub enum ApiError {
    Monitor(MonitorError),
    NotFound(String),
    BadRequest(String),
}

impl From<MonitorError> for ApiError {
    fn from(e: MonitorError) -> Self {
        ApiError::Monitor(e)
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        // ---
        match self {
            ApiError::Monitor(e @ MonitorError::InsufficientCoverage { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "insufficient_coverage", e.to_string())
            }
            ApiError::Monitor(e @ MonitorError::Status(StatusError::NoData)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "no_data", e.to_string())
            }
            ApiError::Monitor(e @ MonitorError::DemoDisabled) => {
                (StatusCode::BAD_REQUEST, "demo_disabled", e.to_string())
            }
            ApiError::Monitor(e @ MonitorError::Store(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let (code, kind, message) = self.parts();
        if code.is_server_error() {
            error!(error = kind, "{}", message);
        }
        let mut resp = no_store((code, Json(json!({ "error": kind, "message": message }))));
        if code == StatusCode::SERVICE_UNAVAILABLE {
            resp.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        resp
    }
}
