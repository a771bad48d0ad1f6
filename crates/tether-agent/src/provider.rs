use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One message in the model's own conversation view.
///
/// `role` is `"user"` or `"model"`, matching the Gemini wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

pub const ROLE_USER: &str = "user";
pub const ROLE_MODEL: &str = "model";

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: ROLE_USER.to_string(),
            parts,
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: ROLE_MODEL.to_string(),
            parts,
        }
    }

    pub fn is_model(&self) -> bool {
        self.role == ROLE_MODEL
    }

    /// All text parts joined, in order. Empty when there are none.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// A single content part. Exactly one field is set in practice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn function_call(call: FunctionCall) -> Self {
        Self {
            function_call: Some(call),
            ..Self::default()
        }
    }

    /// Wrap a tool's textual output as the reply to `call`.
    pub fn function_response(call: &FunctionCall, output: impl Into<String>) -> Self {
        Self {
            function_response: Some(FunctionResponse {
                id: call.id.clone(),
                name: call.name.clone(),
                response: serde_json::json!({ "output": output.into() }),
            }),
            ..Self::default()
        }
    }

    /// Reply to `call` with an error the model can react to.
    pub fn function_error(call: &FunctionCall, error: impl Into<String>) -> Self {
        Self {
            function_response: Some(FunctionResponse {
                id: call.id.clone(),
                name: call.name.clone(),
                response: serde_json::json!({ "error": error.into() }),
            }),
            ..Self::default()
        }
    }
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: Value,
}

/// Tool declaration advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One streamed response chunk (`GenerateContentResponse` on the wire).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelChunk {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl ModelChunk {
    /// Convenience constructor for a text-only chunk.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::from_parts(vec![Part::text(text)])
    }

    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content::model(parts)),
                finish_reason: None,
            }],
            usage_metadata: None,
        }
    }

    fn parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    /// Text of the first candidate, or `None` when it carries no text parts.
    pub fn text(&self) -> Option<String> {
        let segments: Vec<&str> = self
            .parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if segments.is_empty() {
            None
        } else {
            Some(segments.join(""))
        }
    }

    /// Function calls of the first candidate, in order.
    pub fn function_calls(&self) -> Vec<FunctionCall> {
        self.parts()
            .iter()
            .filter_map(|p| p.function_call.clone())
            .collect()
    }
}

/// Lazily produced response chunks of one model call.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ModelChunk, ModelError>> + Send>>;

/// A stateful chat with a model: it keeps its own conversation history and
/// appends each completed exchange to it.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    /// Send `message` as the next user turn and stream the response.
    ///
    /// `prompt_id` correlates all chunks of one call in logs. The exchange is
    /// recorded in `history` only once the stream has been fully consumed
    /// without error.
    async fn send_stream(
        &self,
        message: Vec<Part>,
        tools: &[FunctionDeclaration],
        prompt_id: &str,
    ) -> Result<ChunkStream, ModelError>;

    /// Forget the whole conversation.
    async fn reset_chat(&self) -> Result<(), ModelError>;

    /// The model-side conversation, oldest first.
    async fn history(&self) -> Vec<Content>;

    /// Replace the model-side conversation (checkpoint restore).
    async fn set_history(&self, history: Vec<Content>);
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    /// HTTP 429. `retry_after_secs` comes from the `Retry-After` header when
    /// the server sends one in seconds.
    #[error("Rate limited{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },
}

fn retry_hint(secs: &Option<u64>) -> String {
    match secs {
        Some(s) => format!(", retry after {s}s"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_text_joins_text_parts_only() {
        let json = r#"{"candidates":[{"content":{"role":"model","parts":[
            {"text":"Hel"},{"functionCall":{"name":"ls","args":{"path":"."}}},{"text":"lo"}
        ]}}]}"#;
        let chunk: ModelChunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.text().as_deref(), Some("Hello"));

        let calls = chunk.function_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "ls");
        assert_eq!(calls[0].args["path"], ".");
    }

    #[test]
    fn rate_limit_message_mentions_delay_when_known() {
        let known = ModelError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert_eq!(known.to_string(), "Rate limited, retry after 30s");
        let unknown = ModelError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(unknown.to_string(), "Rate limited");
    }

    #[test]
    fn chunk_without_text_has_no_text() {
        let chunk: ModelChunk =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"STOP"}]}"#).unwrap();
        assert!(chunk.text().is_none());
        assert!(chunk.function_calls().is_empty());

        let empty: ModelChunk = serde_json::from_str("{}").unwrap();
        assert!(empty.text().is_none());
    }

    #[test]
    fn function_response_part_wire_shape() {
        let call = FunctionCall {
            id: None,
            name: "read_file".into(),
            args: Value::Null,
        };
        let json = serde_json::to_value(Part::function_response(&call, "data")).unwrap();
        assert_eq!(json["functionResponse"]["name"], "read_file");
        assert_eq!(json["functionResponse"]["response"]["output"], "data");
        assert!(json.get("text").is_none());
    }

    #[test]
    fn content_text_concatenates() {
        let c = Content::model(vec![Part::text("a"), Part::text("b")]);
        assert!(c.is_model());
        assert_eq!(c.text(), "ab");
    }
}
