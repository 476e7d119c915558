//! Decoded protocol messages and their routing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key whose presence marks a socket message as an image frame.
pub const RADIOMETRIC_KEY: &str = "radiometric";

/// Key carrying the telemetry block of an image frame.
pub const TELEMETRY_KEY: &str = "telemetry";

/// Serial notification announcing an SPI image payload of the given length.
pub const IMAGE_READY_KEY: &str = "image_ready";

/// Error text for frames whose interior could not be decoded.
pub const MALFORMED_JSON: &str = "malformed json payload";

/// A decoded camera message: a JSON object with no fixed schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Map<String, Value>);

impl Message {
    /// Create an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `{"status": <status>}` message.
    pub fn status_message(status: &str) -> Self {
        Self::new().with("status", status)
    }

    /// Create an `{"error": <error>}` message.
    pub fn error_message(error: impl Into<String>) -> Self {
        Self::new().with("error", error.into())
    }

    /// Error message for a frame that failed to decode.
    pub fn malformed(frame: &[u8]) -> Self {
        Self::error_message(MALFORMED_JSON).with("payload", String::from_utf8_lossy(frame))
    }

    /// Insert a field, returning the updated message.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// The `status` field, when it is a string.
    pub fn status(&self) -> Option<&str> {
        self.0.get("status").and_then(Value::as_str)
    }

    /// The `error` field, when it is a string.
    pub fn error(&self) -> Option<&str> {
        self.0.get("error").and_then(Value::as_str)
    }

    /// Whether this message reports an error.
    pub fn is_error(&self) -> bool {
        self.0.contains_key("error")
    }

    /// Whether this message carries radiometric image data.
    pub fn is_frame(&self) -> bool {
        self.0.contains_key(RADIOMETRIC_KEY)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Message {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl std::ops::Index<&str> for Message {
    type Output = Value;

    /// Missing keys index to `Value::Null`, as with `serde_json::Value`.
    fn index(&self, key: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.0.get(key).unwrap_or(&NULL)
    }
}

impl From<Message> for Value {
    fn from(message: Message) -> Self {
        Value::Object(message.0)
    }
}

/// Destination of a decoded message.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Command responses, status notifications and errors.
    Response(Message),
    /// Image frames.
    Frame(Message),
}

impl Delivery {
    /// Route a socket message: anything carrying radiometric data is a frame.
    pub fn route(message: Message) -> Self {
        if message.is_frame() {
            Self::Frame(message)
        } else {
            Self::Response(message)
        }
    }

    pub fn message(&self) -> &Message {
        match self {
            Self::Response(message) | Self::Frame(message) => message,
        }
    }

    pub fn into_message(self) -> Message {
        match self {
            Self::Response(message) | Self::Frame(message) => message,
        }
    }

    pub fn is_frame(&self) -> bool {
        matches!(self, Self::Frame(_))
    }
}
