use serde::{Deserialize, Serialize};

/// Server → Client frame.
///
/// Wire examples:
/// `{ "type": "ready" }`
/// `{ "type": "stream_chunk", "data": { "type": "content", "data": "Hel" } }`
/// `{ "type": "tool_result", "data": { "toolName": "read_file", "result": "..." } }`
/// `{ "type": "error", "error": "Session not found" }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Ready,
    StreamChunk { data: ChunkData },
    ToolResult { data: ToolResultData },
    ToolError { data: ToolErrorData },
    StreamEnd,
    Error { error: String },
}

/// Payload of a `stream_chunk` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChunkData {
    Content(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultData {
    pub tool_name: String,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolErrorData {
    pub tool_name: String,
    pub error: String,
}

impl ServerFrame {
    pub fn content(text: impl Into<String>) -> Self {
        ServerFrame::StreamChunk {
            data: ChunkData::Content(text.into()),
        }
    }

    pub fn tool_result(tool_name: impl Into<String>, result: impl Into<String>) -> Self {
        ServerFrame::ToolResult {
            data: ToolResultData {
                tool_name: tool_name.into(),
                result: result.into(),
            },
        }
    }

    pub fn tool_error(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        ServerFrame::ToolError {
            data: ToolErrorData {
                tool_name: tool_name.into(),
                error: error.into(),
            },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            error: message.into(),
        }
    }

    /// Serialize to the JSON text sent over the socket.
    pub fn to_json(&self) -> String {
        // Every variant is plain strings and unit tags, so serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
