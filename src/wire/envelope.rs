// Envelope - Message types for node-to-node communication
//
// Defines the wire format shared by every protocol exchange: a single
// envelope per line with source, destination, and a body whose `type`
// field discriminates handling. Correlation between a request and its
// reply runs through `msg_id`/`in_reply_to`, never arrival order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Unique identifier for a node (or client) in the cluster
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a node id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Reserved protocol error codes
///
/// `Timeout` is synthesized locally when an RPC deadline fires; it is
/// never sent on the wire as a request. The other two travel in `error`
/// replies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    /// RPC request timed out before a reply arrived
    Timeout,
    /// Message type has no registered handler
    NotSupported,
    /// A handler failed while processing the request
    Crash,
}

impl ErrorCode {
    /// Numeric code carried in the `code` field of an error body
    pub fn code(self) -> u64 {
        match self {
            ErrorCode::Timeout => 0,
            ErrorCode::NotSupported => 10,
            ErrorCode::Crash => 13,
        }
    }
}

/// Body of a protocol message
///
/// `msg_id` is present when the sender expects a reply; `in_reply_to`
/// echoes the peer's `msg_id` on replies. Everything else is treated as
/// opaque payload and round-trips through the flattened field map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Body {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<u64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Body {
    /// Create a body with the given type and no payload
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            msg_id: None,
            in_reply_to: None,
            fields: Map::new(),
        }
    }

    /// Attach a payload field
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Create an `error` body with the given code and text
    pub fn error(code: ErrorCode, text: impl Into<String>) -> Self {
        Self::new("error")
            .with("code", code.code())
            .with("text", text.into())
    }

    /// Get a payload field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Check whether this is an error-typed body
    pub fn is_error(&self) -> bool {
        self.kind == "error"
    }

    /// Numeric error code, if this is an error body carrying one
    pub fn error_code(&self) -> Option<u64> {
        if !self.is_error() {
            return None;
        }
        self.field("code").and_then(Value::as_u64)
    }
}

/// A single transport-level message
///
/// Immutable once sent: one envelope serializes to exactly one line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub src: NodeId,
    pub dest: NodeId,
    pub body: Body,
}

impl Envelope {
    /// Create an envelope
    pub fn new(src: NodeId, dest: NodeId, body: Body) -> Self {
        Self { src, dest, body }
    }
}
