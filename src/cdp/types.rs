use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A CDP command as produced by the command catalog: a method name and its
/// parameters, but no message id yet. Ids are assigned by the connection
/// multiplexer at send time so that every outstanding command on a
/// connection has a unique, monotonically increasing id.
#[derive(Debug, Clone)]
pub struct Command {
    /// CDP method name (e.g. `Page.navigate`).
    pub method: &'static str,
    /// Parameters for the command, already in wire (camelCase) shape.
    pub params: Option<Value>,
}

impl Command {
    /// Build a command with parameters.
    #[must_use]
    pub fn new(method: &'static str, params: Value) -> Self {
        Self {
            method,
            params: Some(params),
        }
    }

    /// Build a parameterless command.
    #[must_use]
    pub fn plain(method: &'static str) -> Self {
        Self {
            method,
            params: None,
        }
    }
}

/// The frame actually written to the WebSocket: a [`Command`] plus the id
/// assigned by the multiplexer and, for commands targeted at a child
/// session (out-of-process iframes), the session id.
#[derive(Debug, Serialize)]
pub struct CommandFrame {
    pub id: u64,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Protocol-level error payload mirrored from the browser.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolError {
    pub code: i64,
    pub message: String,
}

/// Union of every field an incoming frame may carry. Each frame is
/// deserialized into this shape first and then classified: a frame with an
/// `id` is a reply to a command, a frame with a `method` but no `id` is an
/// unsolicited event, anything else is unclassifiable and dropped.
#[derive(Debug, Deserialize)]
pub struct RawMessage {
    pub id: Option<u64>,
    pub method: Option<String>,
    pub params: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<ProtocolError>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// A reply correlated to a previously sent command by `id`.
#[derive(Debug)]
pub struct Reply {
    pub id: u64,
    pub result: Result<Value, ProtocolError>,
}

/// An asynchronous event emitted by the browser.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event name (e.g. `Page.loadEventFired`).
    pub method: String,
    pub params: Value,
    /// Session the event originated from, for session-scoped targets.
    pub session_id: Option<String>,
}

/// Classification of an incoming frame.
pub enum Incoming {
    Reply(Reply),
    Event(Event),
}

impl RawMessage {
    /// Classify this frame as a reply or an event, or `None` when it is
    /// neither (no `id` and no `method`).
    #[must_use]
    pub fn classify(self) -> Option<Incoming> {
        if let Some(id) = self.id {
            let result = match self.error {
                Some(err) => Err(err),
                None => Ok(self.result.unwrap_or(Value::Null)),
            };
            return Some(Incoming::Reply(Reply { id, result }));
        }
        self.method.map(|method| {
            Incoming::Event(Event {
                method,
                params: self.params.unwrap_or(Value::Null),
                session_id: self.session_id,
            })
        })
    }
}
