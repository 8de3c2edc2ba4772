//! JSON-RPC 2.0 message model.
//!
//! A [`Message`] is either a [`Request`] (a notification when it carries no
//! id) or a [`Response`] carrying exactly one of a result or an error. The
//! wire representation is handled by a private flat struct so that
//! `"result": null` survives a round trip as a present-but-null result.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Protocol version stamped on every outgoing message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Error code used for every failure raised by a handler.
pub const INTERNAL_ERROR: i64 = -32603;

/// Correlation id of a request.
///
/// Ids received from the peer are echoed back verbatim, so both the numeric
/// and the string forms allowed by JSON-RPC are kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer id, the form used by the host and by this crate's outbound calls.
    Number(i64),
    /// String id.
    String(String),
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::String(id.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "\"{s}\""),
        }
    }
}

/// The `error` member of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// JSON-RPC error code.
    pub code: i64,
    /// Human-readable description.
    pub message: String,
    /// Optional structured detail. `Some(Value::Null)` is kept distinct from
    /// an absent member.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Create an error object without additional data.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// A request or, when `id` is `None`, a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Method name.
    pub method: String,
    /// Parameters, usually a positional array. `Null` when absent.
    pub params: Value,
    /// Correlation id; `None` marks a notification.
    pub id: Option<RequestId>,
}

impl Request {
    /// Create a request that expects a response.
    #[must_use]
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
            id: Some(id.into()),
        }
    }

    /// Create a notification (no response expected).
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
            id: None,
        }
    }

    /// Returns `true` if no response is expected.
    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Returns the positional parameter at `index`.
    ///
    /// Non-array params are treated as a single positional parameter.
    #[must_use]
    pub fn param(&self, index: usize) -> Option<&Value> {
        match &self.params {
            Value::Array(items) => items.get(index),
            Value::Null => None,
            other if index == 0 => Some(other),
            _ => None,
        }
    }
}

/// Outcome carried by a [`Response`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// Successful result (may be `Null`).
    Result(Value),
    /// Failure.
    Error(ErrorObject),
}

/// A response correlated to an earlier request by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Id of the request being answered.
    pub id: RequestId,
    /// Result or error.
    pub payload: ResponsePayload,
}

impl Response {
    /// Create a successful response.
    #[must_use]
    pub fn result(id: RequestId, result: Value) -> Self {
        Self {
            id,
            payload: ResponsePayload::Result(result),
        }
    }

    /// Create an error response.
    #[must_use]
    pub fn error(id: RequestId, code: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            payload: ResponsePayload::Error(ErrorObject::new(code, message)),
        }
    }

    /// Create an error response with the [`INTERNAL_ERROR`] code.
    #[must_use]
    pub fn internal_error(id: RequestId, message: impl Into<String>) -> Self {
        Self::error(id, INTERNAL_ERROR, message)
    }

    /// Split the response into the conventional `Result` shape.
    ///
    /// # Errors
    ///
    /// Returns the carried [`ErrorObject`] when the peer reported a failure.
    pub fn into_result(self) -> std::result::Result<Value, ErrorObject> {
        match self.payload {
            ResponsePayload::Result(value) => Ok(value),
            ResponsePayload::Error(error) => Err(error),
        }
    }
}

/// Any JSON-RPC message travelling over the framed channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireMessage", into = "WireMessage")]
pub enum Message {
    /// Request or notification.
    Request(Request),
    /// Response to an earlier request.
    Response(Response),
}

impl Message {
    /// Returns the method name when the message is a request.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(request) => Some(&request.method),
            Self::Response(_) => None,
        }
    }

    /// Returns the correlation id, if any.
    #[must_use]
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(request) => request.id.as_ref(),
            Self::Response(response) => Some(&response.id),
        }
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Self::Request(request)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

/// Flat on-the-wire shape shared by every message kind.
#[derive(Serialize, Deserialize)]
struct WireMessage {
    #[serde(default)]
    jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<RequestId>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorObject>,
}

/// Distinguishes `"result": null` (present) from a missing `result` key.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl From<Message> for WireMessage {
    fn from(message: Message) -> Self {
        let mut wire = Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: None,
            params: None,
            id: None,
            result: None,
            error: None,
        };
        match message {
            Message::Request(request) => {
                wire.method = Some(request.method);
                wire.params = (!request.params.is_null()).then_some(request.params);
                wire.id = request.id;
            }
            Message::Response(response) => {
                wire.id = Some(response.id);
                match response.payload {
                    ResponsePayload::Result(value) => wire.result = Some(value),
                    ResponsePayload::Error(error) => wire.error = Some(error),
                }
            }
        }
        wire
    }
}

impl TryFrom<WireMessage> for Message {
    type Error = Error;

    fn try_from(wire: WireMessage) -> std::result::Result<Self, Self::Error> {
        if let Some(method) = wire.method {
            return Ok(Self::Request(Request {
                method,
                params: wire.params.unwrap_or(Value::Null),
                id: wire.id,
            }));
        }

        let id = wire.id.ok_or_else(|| {
            Error::InvalidMessage("message has neither a method nor an id".to_string())
        })?;

        let payload = match (wire.error, wire.result) {
            (Some(error), _) => ResponsePayload::Error(error),
            (None, Some(result)) => ResponsePayload::Result(result),
            (None, None) => {
                return Err(Error::InvalidMessage(format!(
                    "response {id} has neither a result nor an error"
                )));
            }
        };

        Ok(Self::Response(Response { id, payload }))
    }
}
