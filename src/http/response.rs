//! Error responses.
//!
//! | failure            | status |
//! |--------------------|--------|
//! | bad request body   | 400    |
//! | NotConnected       | 503    |
//! | Timeout            | 504    |
//! | UpstreamError      | 422    |
//! | any other failure  | 502    |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::error::BridgeError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Bridge(BridgeError),
}

impl From<BridgeError> for ApiError {
    fn from(e: BridgeError) -> Self {
        ApiError::Bridge(e)
    }
}

/// HTTP status for a bridge failure.
pub fn status_for(error: &BridgeError) -> StatusCode {
    match error {
        BridgeError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
        BridgeError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        BridgeError::UpstreamError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        BridgeError::ConnectionLost
        | BridgeError::SendFailure(_)
        | BridgeError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
    }
}

fn error_body(error: &BridgeError) -> Value {
    match error {
        BridgeError::UpstreamError {
            code,
            message,
            data,
        } => {
            let mut body = json!({ "kind": error.kind(), "code": code, "message": message });
            if let Some(data) = data {
                body["data"] = data.clone();
            }
            json!({ "error": body })
        }
        other => json!({
            "error": { "kind": other.kind(), "message": other.to_string() }
        }),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": { "kind": "bad_request", "message": message } })),
            )
                .into_response(),
            ApiError::Bridge(error) => (status_for(&error), Json(error_body(&error))).into_response(),
        }
    }
}
