//! Maps [`mindmate_core::Error`] onto HTTP responses.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use mindmate_core::{Error, RunMode};
use serde_json::json;

/// A core error plus whether diagnostics may be shown to the client.
#[derive(Debug)]
pub struct ApiError {
    error: Error,
    expose_details: bool,
}

impl ApiError {
    pub fn new(error: Error, mode: RunMode) -> Self {
        Self {
            error,
            expose_details: !mode.is_production(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut body = json!({
            "success": false,
            "error": self.error.public_message(),
        });
        if self.expose_details {
            body["details"] = json!(self.error.to_string());
        }

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = self.error.retry_after() {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
