//! Error taxonomy for the bridge core.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Result alias for facade operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Failures a caller of the bridge can observe.
///
/// `Clone` so a single connection-loss event can settle every pending
/// request with the same failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// Submit attempted while the upstream connection is not established.
    #[error("upstream not connected")]
    NotConnected,

    /// The request deadline passed, or the sweeper reclaimed it.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The connection dropped while the request was in flight.
    #[error("upstream connection lost")]
    ConnectionLost,

    /// Writing the request frame to the transport failed.
    #[error("failed to send request: {0}")]
    SendFailure(String),

    /// The upstream answered with an explicit error object, kept verbatim.
    #[error("upstream error {code}: {message}")]
    UpstreamError {
        code: ErrorCode,
        message: String,
        data: Option<Value>,
    },

    /// An inbound frame could not be parsed.
    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),
}

/// Upstream error code as sent: integer or string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::Number(n) => write!(f, "{n}"),
            ErrorCode::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ErrorCode {
    fn from(code: i64) -> Self {
        ErrorCode::Number(code)
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        ErrorCode::Text(code.to_string())
    }
}

impl BridgeError {
    /// Upstream rejection without extra data.
    pub fn upstream(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        BridgeError::UpstreamError {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }

    /// Whether resending the same operation can reasonably succeed.
    ///
    /// An upstream rejection will be rejected identically again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::NotConnected
                | BridgeError::SendFailure(_)
                | BridgeError::Timeout(_)
                | BridgeError::ConnectionLost
        )
    }

    /// Stable label for logs, metrics and response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::NotConnected => "not_connected",
            BridgeError::Timeout(_) => "timeout",
            BridgeError::ConnectionLost => "connection_lost",
            BridgeError::SendFailure(_) => "send_failure",
            BridgeError::UpstreamError { .. } => "upstream_error",
            BridgeError::MalformedResponse(_) => "malformed_response",
        }
    }
}
