//! Wire message shapes exchanged with the upstream.
//!
//! ```text
//! request:  {"id": 7, "method": "quote", "params": {...}}
//! response: {"id": 7, "result": {...}}
//!           {"id": 7, "error": {"code": 400, "message": "...", "data": ...}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::correlation::CorrelationId;
use crate::error::{BridgeError, ErrorCode};

/// Outbound request frame.
#[derive(Debug, Serialize)]
pub struct WireRequest<'a> {
    pub id: CorrelationId,
    pub method: &'a str,
    pub params: &'a Value,
}

impl WireRequest<'_> {
    pub fn encode(&self) -> Result<String, BridgeError> {
        serde_json::to_string(self).map_err(|e| BridgeError::SendFailure(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Success response for a request.
    Result { id: CorrelationId, result: Value },
    /// Explicit upstream rejection of a request.
    Error { id: CorrelationId, error: BridgeError },
    /// Well-formed frame that carries no usable correlation id.
    Uncorrelated,
}

/// Decode one inbound frame.
pub fn decode(frame: &[u8]) -> Result<Inbound, BridgeError> {
    let response: WireResponse =
        serde_json::from_slice(frame).map_err(|e| BridgeError::MalformedResponse(e.to_string()))?;

    let Some(id) = response.id.as_ref().and_then(parse_id) else {
        return Ok(Inbound::Uncorrelated);
    };

    match response.error {
        Some(error) if !error.is_null() => Ok(Inbound::Error {
            id,
            error: upstream_error(error),
        }),
        _ => Ok(Inbound::Result {
            id,
            result: response.result.unwrap_or(Value::Null),
        }),
    }
}

/// Ids go out as numbers; numeric strings are accepted on the way back.
fn parse_id(id: &Value) -> Option<CorrelationId> {
    match id {
        Value::Number(n) => n.as_u64().map(CorrelationId::from),
        Value::String(s) => s.parse::<u64>().ok().map(CorrelationId::from),
        _ => None,
    }
}

/// Absent or unusable codes read as `-1`.
const UNKNOWN_CODE: i64 = -1;

fn upstream_error(error: Value) -> BridgeError {
    match error {
        Value::Object(mut fields) => BridgeError::UpstreamError {
            code: match fields.remove("code") {
                Some(Value::Number(n)) => match n.as_i64() {
                    Some(code) => ErrorCode::Number(code),
                    None => ErrorCode::Text(n.to_string()),
                },
                Some(Value::String(code)) => ErrorCode::Text(code),
                _ => ErrorCode::Number(UNKNOWN_CODE),
            },
            message: match fields.remove("message") {
                Some(Value::String(message)) => message,
                Some(other) => other.to_string(),
                None => "unknown upstream error".to_string(),
            },
            data: fields.remove("data"),
        },
        Value::String(message) => BridgeError::upstream(UNKNOWN_CODE, message),
        other => BridgeError::upstream(UNKNOWN_CODE, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_shape() {
        let params = json!({"send_asset": "BTC", "recv_asset": "USDT", "send_amount": 100000});
        let frame = WireRequest {
            id: CorrelationId::new(7),
            method: "quote",
            params: &params,
        }
        .encode()
        .unwrap();

        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value, json!({"id": 7, "method": "quote", "params": params}));
    }

    #[test]
    fn decodes_result() {
        let frame = br#"{"id": 7, "result": {"send_amount": 100000, "recv_amount": 101000}}"#;
        assert_eq!(
            decode(frame).unwrap(),
            Inbound::Result {
                id: CorrelationId::new(7),
                result: json!({"send_amount": 100000, "recv_amount": 101000}),
            }
        );
    }

    #[test]
    fn decodes_error_object() {
        let frame = br#"{"id": "9", "error": {"code": 404, "message": "unknown pair"}}"#;
        assert_eq!(
            decode(frame).unwrap(),
            Inbound::Error {
                id: CorrelationId::new(9),
                error: BridgeError::upstream(404, "unknown pair"),
            }
        );
    }

    #[test]
    fn error_code_and_data_are_kept_verbatim() {
        let frame = br#"{"id": 4, "error": {"code": "UNKNOWN_ASSET", "message": "no such asset", "data": {"asset": "XYZ"}}}"#;
        assert_eq!(
            decode(frame).unwrap(),
            Inbound::Error {
                id: CorrelationId::new(4),
                error: BridgeError::UpstreamError {
                    code: ErrorCode::Text("UNKNOWN_ASSET".into()),
                    message: "no such asset".into(),
                    data: Some(json!({"asset": "XYZ"})),
                },
            }
        );
    }

    #[test]
    fn missing_code_reads_as_unknown() {
        let frame = br#"{"id": 5, "error": {"message": "busy"}}"#;
        assert_eq!(
            decode(frame).unwrap(),
            Inbound::Error {
                id: CorrelationId::new(5),
                error: BridgeError::upstream(-1, "busy"),
            }
        );
    }

    #[test]
    fn null_error_is_success() {
        let frame = br#"{"id": 3, "result": null, "error": null}"#;
        assert_eq!(
            decode(frame).unwrap(),
            Inbound::Result {
                id: CorrelationId::new(3),
                result: Value::Null
            }
        );
    }

    #[test]
    fn frames_without_usable_id_are_uncorrelated() {
        assert_eq!(decode(br#"{"event": "tick"}"#).unwrap(), Inbound::Uncorrelated);
        assert_eq!(decode(br#"{"id": "abc", "result": 1}"#).unwrap(), Inbound::Uncorrelated);
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(decode(b"not json"), Err(BridgeError::MalformedResponse(_))));
        assert!(matches!(decode(b"42"), Err(BridgeError::MalformedResponse(_))));
    }
}
