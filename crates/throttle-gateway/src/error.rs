// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-facing error responses.
//!
//! Proxy endpoints answer in the caller's dialect so SDK error handling keeps
//! working; control endpoints use a neutral `{"error": {...}}` body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use throttle_core::{ClientDialect, ThrottleError};
use tracing::{error, warn};

/// A [`ThrottleError`] paired with the shape it should be rendered in.
#[derive(Debug)]
pub struct ApiError {
    pub error: ThrottleError,
    pub dialect: Option<ClientDialect>,
}

impl ApiError {
    pub fn new(dialect: ClientDialect, error: ThrottleError) -> Self {
        Self {
            error,
            dialect: Some(dialect),
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn body(&self) -> Value {
        let kind = self.error.kind();
        let message = self.error.to_string();
        match self.dialect {
            Some(ClientDialect::Anthropic) => json!({
                "type": "error",
                "error": {"type": kind, "message": message},
            }),
            Some(ClientDialect::OpenAi) => json!({
                "error": {"message": message, "type": kind, "code": null},
            }),
            None => json!({"error": {"type": kind, "message": message}}),
        }
    }
}

impl From<ThrottleError> for ApiError {
    fn from(error: ThrottleError) -> Self {
        Self {
            error,
            dialect: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), kind = self.error.kind(), error = %self.error, "request failed");
        } else {
            warn!(status = status.as_u16(), kind = self.error.kind(), error = %self.error, "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}
