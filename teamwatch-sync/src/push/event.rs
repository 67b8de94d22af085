//! Inbound push events.

use serde::Serialize;
use serde_json::Value;

/// One server event: a JSON object with a string `type` discriminator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
}

impl PushEvent {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Parse a text frame. `None` for anything that is not a JSON object
    /// with a string `type`.
    ///
    /// The payload is the `payload` field, else `data`, else the remaining
    /// fields of the object.
    pub fn parse(text: &str) -> Option<Self> {
        let Value::Object(mut fields) = serde_json::from_str::<Value>(text).ok()? else {
            return None;
        };
        let Value::String(kind) = fields.remove("type")? else {
            return None;
        };
        let payload = fields
            .remove("payload")
            .or_else(|| fields.remove("data"))
            .unwrap_or(Value::Object(fields));
        Some(Self { kind, payload })
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}
