//! JSON-RPC 2.0 envelope codec (spec §3 Data Model, §4.1 Wire codec).
//!
//! A wire envelope is a request iff it carries both `id` and `method`, a
//! notification iff it carries `method` without `id`, and a response iff it
//! carries `id` without `method` (and carries exactly one of `result` /
//! `error`). [`Message`] models this as an untagged enum over three structs,
//! the same split the wider MCP SDK corpus uses, so that `serde` derives the
//! dispatch instead of a hand-rolled `match` on raw [`serde_json::Value`].

use std::fmt;

use mcp_stream_core::{jsonrpc_error_codes, McpError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The literal `"2.0"`. A marker type so `jsonrpc` always serializes to the
/// right string and deserialization rejects any other value outright,
/// instead of silently accepting unversioned or mismatched-version input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == "2.0" {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported jsonrpc version: {s}"
            )))
        }
    }
}

/// A JSON-RPC id: either a string or a number (§3 "Id polymorphism"). The two
/// representations never compare equal across variants even when the
/// underlying numeric value matches a numeric string, matching the
/// type-preserving round trip §8 requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// A string id, e.g. a UUID.
    String(String),
    /// A number id, e.g. a locally incremented counter.
    Number(i64),
}

impl PartialEq for RequestId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for RequestId {}

impl std::hash::Hash for RequestId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Self::String(s) => {
                0u8.hash(state);
                s.hash(state);
            }
            Self::Number(n) => {
                1u8.hash(state);
                n.hash(state);
            }
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}
impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}
impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}
impl From<i32> for RequestId {
    fn from(n: i32) -> Self {
        Self::Number(i64::from(n))
    }
}
impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        Self::Number(n as i64)
    }
}

/// A request: carries both `id` and `method`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    jsonrpc: JsonRpcVersion,
    /// The method name, e.g. `"tools/call"`.
    pub method: String,
    /// Method parameters. Absent params serialize as a missing field, not
    /// `null`, so a peer that distinguishes "no params" from "null params"
    /// sees what was intended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// The request id, echoed back on the matching response.
    pub id: RequestId,
}

impl Request {
    /// Builds a request with no parameters.
    #[must_use]
    pub fn new(method: impl Into<String>, id: impl Into<RequestId>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params: None,
            id: id.into(),
        }
    }

    /// Builds a request carrying `params`.
    #[must_use]
    pub fn with_params(
        method: impl Into<String>,
        params: Value,
        id: impl Into<RequestId>,
    ) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params: Some(params),
            id: id.into(),
        }
    }
}

/// A notification: carries `method` but no `id`; never answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    jsonrpc: JsonRpcVersion,
    /// The method name, e.g. `"notifications/cancelled"`.
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    /// Builds a notification with no parameters.
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params: None,
        }
    }

    /// Builds a notification carrying `params`.
    #[must_use]
    pub fn with_params(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params: Some(params),
        }
    }
}

/// A structured JSON-RPC error object, embedded in an error [`Response`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    /// The error code. Values in -32768..-32000 are reserved by JSON-RPC.
    pub code: i32,
    /// A short, human-readable summary.
    pub message: String,
    /// Optional structured error payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Builds an error with no structured data.
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Builds an error carrying structured `data`.
    #[must_use]
    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// `-32700 Parse error`.
    #[must_use]
    pub fn parse_error(detail: impl fmt::Display) -> Self {
        Self::new(
            jsonrpc_error_codes::PARSE_ERROR,
            format!("Parse error: {detail}"),
        )
    }

    /// `-32600 Invalid Request`.
    #[must_use]
    pub fn invalid_request(detail: impl fmt::Display) -> Self {
        Self::new(
            jsonrpc_error_codes::INVALID_REQUEST,
            format!("Invalid Request: {detail}"),
        )
    }

    /// `-32601 Method not found`.
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            jsonrpc_error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        )
    }

    /// `-32602 Invalid params`.
    #[must_use]
    pub fn invalid_params(detail: impl fmt::Display) -> Self {
        Self::new(
            jsonrpc_error_codes::INVALID_PARAMS,
            format!("Invalid params: {detail}"),
        )
    }

    /// `-32603 Internal error`.
    #[must_use]
    pub fn internal_error(detail: impl fmt::Display) -> Self {
        Self::new(
            jsonrpc_error_codes::INTERNAL_ERROR,
            format!("Internal error: {detail}"),
        )
    }
}

/// The success/error union carried by a response. Untagged so a response on
/// the wire has exactly one of `result` or `error`, never both and never
/// neither, per §3's response invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    /// A successful result.
    Success {
        /// The method's return value.
        result: Value,
    },
    /// A failed call.
    Error {
        /// The error object.
        error: RpcError,
    },
}

/// A response: carries `id` but no `method`, and exactly one of
/// `result`/`error`.
///
/// A response to a request that failed to parse (so no id could be read at
/// all) uses a `null` id, the one case where `id` does not identify a
/// pending request (§7 Protocol errors).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    jsonrpc: JsonRpcVersion,
    #[serde(flatten)]
    payload: ResponsePayload,
    /// The id of the request this answers, or `null` for a parse error.
    pub id: Option<RequestId>,
}

impl Response {
    /// Builds a success response.
    #[must_use]
    pub fn success(result: Value, id: RequestId) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: ResponsePayload::Success { result },
            id: Some(id),
        }
    }

    /// Builds an error response for a known request id.
    #[must_use]
    pub fn error(error: RpcError, id: RequestId) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: ResponsePayload::Error { error },
            id: Some(id),
        }
    }

    /// Builds an error response whose request id could not be determined
    /// (e.g. the request itself failed to parse), per JSON-RPC's `id: null`
    /// convention.
    #[must_use]
    pub fn error_without_id(error: RpcError) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: ResponsePayload::Error { error },
            id: None,
        }
    }

    /// `true` if this is a success response.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.payload, ResponsePayload::Success { .. })
    }

    /// The result, if this is a success response.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        match &self.payload {
            ResponsePayload::Success { result } => Some(result),
            ResponsePayload::Error { .. } => None,
        }
    }

    /// The error object, if this is an error response.
    #[must_use]
    pub fn rpc_error(&self) -> Option<&RpcError> {
        match &self.payload {
            ResponsePayload::Success { .. } => None,
            ResponsePayload::Error { error } => Some(error),
        }
    }
}

/// Any one of the three envelope shapes a peer may send on the wire.
///
/// Dispatch is derived by `serde` from field presence rather than a tag
/// field, matching JSON-RPC's untagged wire format: `serde_json` tries each
/// variant in order and keeps the first that parses, so variant order here
/// is significant — `Request` before `Response` before `Notification` lets a
/// request/response with an absent `method`/`id` fall through correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    /// Carries both `id` and `method`.
    Request(Request),
    /// Carries `id` but no `method`.
    Response(Response),
    /// Carries `method` but no `id`.
    Notification(Notification),
}

impl Message {
    /// The request id, for requests and responses. `None` for notifications
    /// and for parse-error responses.
    #[must_use]
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(r) => Some(&r.id),
            Self::Response(r) => r.id.as_ref(),
            Self::Notification(_) => None,
        }
    }

    /// The method name, for requests and notifications.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(r) => Some(&r.method),
            Self::Notification(n) => Some(&n.method),
            Self::Response(_) => None,
        }
    }
}

impl From<Request> for Message {
    fn from(r: Request) -> Self {
        Self::Request(r)
    }
}
impl From<Notification> for Message {
    fn from(n: Notification) -> Self {
        Self::Notification(n)
    }
}
impl From<Response> for Message {
    fn from(r: Response) -> Self {
        Self::Response(r)
    }
}

/// Serializes `message` to a single line of JSON (no trailing newline; the
/// caller's framing layer, e.g. NDJSON or SSE `data:` lines, owns that).
///
/// # Errors
/// Never fails for the types in this crate, but returns [`McpError::Protocol`]
/// to keep the signature stable if a future envelope variant carries
/// non-serializable data.
pub fn encode(message: &Message) -> mcp_stream_core::Result<String> {
    serde_json::to_string(message).map_err(|e| McpError::protocol(format!("encode failed: {e}")))
}

/// Parses one JSON-RPC envelope from `input`.
///
/// # Errors
/// Returns a [`RpcError::parse_error`] if `input` is not valid JSON, or a
/// [`RpcError::invalid_request`] if it is valid JSON but matches none of the
/// three envelope shapes (e.g. it carries neither `id` nor `method`, or both
/// `result` and `error`).
pub fn decode(input: &str) -> std::result::Result<Message, RpcError> {
    serde_json::from_str::<Value>(input)
        .map_err(RpcError::parse_error)
        .and_then(|value| {
            serde_json::from_value::<Message>(value).map_err(RpcError::invalid_request)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_round_trips_with_string_id() {
        let req = Request::with_params("tools/call", serde_json::json!({"name": "x"}), "abc-1");
        let encoded = encode(&Message::Request(req)).unwrap();
        let decoded = decode(&encoded).unwrap();
        match decoded {
            Message::Request(r) => {
                assert_eq!(r.method, "tools/call");
                assert_eq!(r.id, RequestId::String("abc-1".into()));
            }
            other => panic!("expected Request, got {other:?}"),
        }
    }

    #[test]
    fn request_round_trips_with_numeric_id() {
        let req = Request::new("ping", 42i64);
        let encoded = encode(&Message::Request(req)).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.id(), Some(&RequestId::Number(42)));
    }

    #[test]
    fn numeric_and_string_ids_are_never_equal() {
        assert_ne!(RequestId::Number(1), RequestId::String("1".into()));
    }

    #[test]
    fn notification_has_no_id() {
        let note = Notification::with_params(
            "notifications/cancelled",
            serde_json::json!({"requestId": 1, "reason": "client gave up"}),
        );
        let encoded = encode(&Message::Notification(note)).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert!(decoded.id().is_none());
        assert_eq!(decoded.method(), Some("notifications/cancelled"));
    }

    #[test]
    fn success_response_round_trips() {
        let resp = Response::success(serde_json::json!({"ok": true}), RequestId::Number(7));
        let encoded = encode(&Message::Response(resp)).unwrap();
        let decoded = decode(&encoded).unwrap();
        match decoded {
            Message::Response(r) => {
                assert!(r.is_success());
                assert_eq!(r.result(), Some(&serde_json::json!({"ok": true})));
            }
            other => panic!("expected Response, got {other:?}"),
        }
    }

    #[test]
    fn error_response_carries_exactly_one_payload_variant() {
        let resp = Response::error(RpcError::method_not_found("bogus"), RequestId::Number(1));
        let encoded = encode(&Message::Response(resp)).unwrap();
        let value: Value = serde_json::from_str(&encoded).unwrap();
        assert!(value.get("error").is_some());
        assert!(value.get("result").is_none());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = decode("{not json").unwrap_err();
        assert_eq!(err.code, jsonrpc_error_codes::PARSE_ERROR);
    }

    #[test]
    fn envelope_with_neither_id_nor_method_is_invalid_request() {
        let err = decode(r#"{"jsonrpc":"2.0"}"#).unwrap_err();
        assert_eq!(err.code, jsonrpc_error_codes::INVALID_REQUEST);
    }

    #[test]
    fn params_omitted_when_none() {
        let req = Request::new("ping", 1i64);
        let encoded = encode(&Message::Request(req)).unwrap();
        let value: Value = serde_json::from_str(&encoded).unwrap();
        assert!(value.get("params").is_none());
    }

    proptest::proptest! {
        #[test]
        fn decode_of_encode_preserves_numeric_id(n in proptest::num::i64::ANY) {
            let req = Request::new("noop", n);
            let encoded = encode(&Message::Request(req)).unwrap();
            let decoded = decode(&encoded).unwrap();
            proptest::prop_assert_eq!(decoded.id(), Some(&RequestId::Number(n)));
        }

        #[test]
        fn decode_of_encode_preserves_string_id(s in "[a-zA-Z0-9_-]{1,32}") {
            let req = Request::new("noop", s.clone());
            let encoded = encode(&Message::Request(req)).unwrap();
            let decoded = decode(&encoded).unwrap();
            proptest::prop_assert_eq!(decoded.id(), Some(&RequestId::String(s)));
        }
    }
}
