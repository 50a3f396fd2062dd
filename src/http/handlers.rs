//! Request handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::bridge::BridgeStatus;
use crate::http::response::ApiError;
use crate::http::server::AppState;

#[derive(Debug, Deserialize)]
pub struct OperationRequest {
    pub method: String,
    #[serde(default = "empty_params")]
    pub params: Value,
    /// Safe to repeat; enables retries.
    #[serde(default)]
    pub idempotent: bool,
}

fn empty_params() -> Value {
    json!({})
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub send_asset: String,
    pub recv_asset: String,
    /// In the send asset's smallest unit.
    pub send_amount: u64,
}

impl QuoteRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.send_asset.trim().is_empty() || self.recv_asset.trim().is_empty() {
            return Err(ApiError::BadRequest("assets must not be empty".into()));
        }
        if self.send_asset == self.recv_asset {
            return Err(ApiError::BadRequest("send and receive assets must differ".into()));
        }
        if self.send_amount == 0 {
            return Err(ApiError::BadRequest("send_amount must be positive".into()));
        }
        Ok(())
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

pub async fn submit_operation(
    State(state): State<AppState>,
    payload: Result<Json<OperationRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = body(payload)?;
    if request.method.trim().is_empty() {
        return Err(ApiError::BadRequest("method must not be empty".into()));
    }

    let result = if request.idempotent {
        state.bridge.submit_idempotent(&request.method, request.params).await
    } else {
        state.bridge.submit_operation(&request.method, request.params).await
    };

    match result {
        Ok(result) => Ok(Json(json!({ "result": result }))),
        Err(e) => {
            tracing::warn!(method = %request.method, error = %e, "Operation failed");
            Err(e.into())
        }
    }
}

pub async fn quote(
    State(state): State<AppState>,
    payload: Result<Json<QuoteRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = body(payload)?;
    request.validate()?;

    let params = json!({
        "send_asset": request.send_asset,
        "recv_asset": request.recv_asset,
        "send_amount": request.send_amount,
    });
    let result = state.bridge.submit_idempotent("quote", params).await?;
    Ok(Json(json!({ "result": result })))
}

pub async fn status(State(state): State<AppState>) -> Json<BridgeStatus> {
    Json(state.bridge.status())
}

pub async fn health(State(state): State<AppState>) -> Response {
    let status = state.bridge.status();
    let code = if status.connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(json!({ "healthy": status.connected, "state": status.state }))).into_response()
}
