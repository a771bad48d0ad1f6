use serde_json::Value;
use thiserror::Error;

/// Client → Server frame, validated.
///
/// Wire: `{ "type": "init", "sessionId": "..." }` or
/// `{ "type": "message", "content": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Init { session_id: String },
    Message { content: String },
}

/// Why an inbound frame was rejected. The `Display` text is sent to the
/// client verbatim in an `error` frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Not JSON, not an object, or no string `type` discriminator.
    #[error("Invalid message format")]
    InvalidFormat,

    #[error("Session ID is required")]
    SessionIdRequired,

    #[error("Message content must be a string")]
    InvalidContent,

    #[error("Unknown message type: {0}")]
    UnknownType(String),
}

impl ClientFrame {
    /// Parse and validate one inbound text frame.
    ///
    /// The `type` discriminator is checked first so a frame with an unknown
    /// type is reported as such rather than as a generic format error.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text).map_err(|_| ProtocolError::InvalidFormat)?;
        let obj = value.as_object().ok_or(ProtocolError::InvalidFormat)?;
        let frame_type = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::InvalidFormat)?;

        match frame_type {
            "init" => match obj.get("sessionId").and_then(Value::as_str) {
                Some(id) if !id.is_empty() => Ok(ClientFrame::Init {
                    session_id: id.to_string(),
                }),
                _ => Err(ProtocolError::SessionIdRequired),
            },
            "message" => match obj.get("content") {
                None | Some(Value::Null) => Ok(ClientFrame::Message {
                    content: String::new(),
                }),
                Some(Value::String(s)) => Ok(ClientFrame::Message { content: s.clone() }),
                Some(_) => Err(ProtocolError::InvalidContent),
            },
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }
}
